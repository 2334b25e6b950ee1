//! C6: session-scoped multi-reader/single-writer/exclusive locks with a
//! FIFO wait queue and TTL-based expiry.
//!
//! Grounded on the teacher's `event_bus::hub::EventHub` for the "one
//! mutex-guarded table, short critical sections" shape; the compatibility
//! matrix itself is new, taken directly from §4.6's table.

pub mod queue;

use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::info;

use crate::model::{AccessLevel, Lock, LockRequest, LockScope, LockType};
use crate::utils::id_generator;

pub use queue::WaitQueue;

#[derive(Debug, Error, Diagnostic)]
pub enum LockError {
    #[error("lock not found: {0}")]
    #[diagnostic(code(reasoning_sessions::locks::not_found))]
    NotFound(String),

    #[error("lock conflict, wait {wait_time_ms}ms")]
    #[diagnostic(code(reasoning_sessions::locks::conflict))]
    Conflict {
        wait_time_ms: i64,
        conflicting_locks: Vec<Lock>,
    },

    #[error("permission denied: {0}")]
    #[diagnostic(code(reasoning_sessions::locks::permission_denied))]
    PermissionDenied(String),
}

pub type Result<T> = std::result::Result<T, LockError>;

pub struct AcquireRequest {
    pub session_id: String,
    pub client_id: String,
    pub lock_type: LockType,
    pub scope: LockScope,
    pub access_level: AccessLevel,
    pub timeout_ms: i64,
    pub reason: String,
}

fn required_access(lock_type: LockType) -> AccessLevel {
    match lock_type {
        LockType::Read => AccessLevel::Read,
        LockType::Write => AccessLevel::Write,
        LockType::Exclusive => AccessLevel::Admin,
    }
}

struct SessionLocks {
    active: Vec<Lock>,
    queue: WaitQueue,
}

impl Default for SessionLocks {
    fn default() -> Self {
        Self {
            active: Vec::new(),
            queue: WaitQueue::new(),
        }
    }
}

/// Single mutex-guarded table covering every session's locks and queue, plus
/// a reverse index from client to held lock ids. All public methods are
/// short and O(locks-per-session), safe under contention (§5).
pub struct LockManager {
    sessions: Mutex<FxHashMap<String, SessionLocks>>,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(FxHashMap::default()),
        }
    }

    fn conflicts_with_active(active: &[Lock], lock_type: LockType, scope: LockScope, now: i64) -> Vec<Lock> {
        active
            .iter()
            .filter(|held| !held.is_expired(now))
            .filter(|held| !held.is_compatible_with(lock_type, scope))
            .cloned()
            .collect()
    }

    /// `acquire(req)`: permission check, then conflict check against active
    /// (unexpired) locks. On conflict, the request is queued FIFO and an
    /// error carrying `waitTime = min(conflicting.expiresAt) - now` is
    /// returned; the caller must retry explicitly — there is no callback
    /// wakeup in this contract.
    pub fn acquire(&self, req: AcquireRequest, now: i64) -> Result<Lock> {
        if !req.access_level.dominates(required_access(req.lock_type)) {
            return Err(LockError::PermissionDenied(format!(
                "access level {:?} insufficient for {:?} lock",
                req.access_level, req.lock_type
            )));
        }

        let mut sessions = self.sessions.lock();
        let entry = sessions.entry(req.session_id.clone()).or_default();
        entry.active.retain(|l| !l.is_expired(now));

        let conflicts = Self::conflicts_with_active(&entry.active, req.lock_type, req.scope, now);
        if !conflicts.is_empty() {
            let wait_time_ms = conflicts.iter().map(|c| c.expires_at).min().unwrap_or(now) - now;
            entry.queue.push(LockRequest {
                request_id: id_generator::lock_id(now),
                session_id: req.session_id.clone(),
                client_id: req.client_id.clone(),
                lock_type: req.lock_type,
                scope: req.scope,
                requested_at: now,
                timeout_ms: req.timeout_ms,
                reason: req.reason.clone(),
            });
            return Err(LockError::Conflict {
                wait_time_ms: wait_time_ms.max(0),
                conflicting_locks: conflicts,
            });
        }

        let lock = Lock {
            lock_id: id_generator::lock_id(now),
            session_id: req.session_id.clone(),
            client_id: req.client_id,
            lock_type: req.lock_type,
            scope: req.scope,
            acquired_at: now,
            expires_at: now + req.timeout_ms,
            reason: req.reason,
        };
        entry.active.push(lock.clone());
        info!(session_id = %req.session_id, lock_id = %lock.lock_id, ?req.lock_type, "lock acquired");
        Ok(lock)
    }

    /// Removes the lock, then drains the wait queue in order, granting each
    /// request for which compatibility now holds; requests that still
    /// conflict remain in place (no reordering) — P9.
    pub fn release(&self, session_id: &str, lock_id: &str, now: i64) -> Result<Vec<Lock>> {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| LockError::NotFound(lock_id.to_string()))?;

        let before = entry.active.len();
        entry.active.retain(|l| l.lock_id != lock_id);
        if entry.active.len() == before {
            return Err(LockError::NotFound(lock_id.to_string()));
        }

        Ok(self.drain_queue(entry, now))
    }

    fn drain_queue(&self, entry: &mut SessionLocks, now: i64) -> Vec<Lock> {
        entry.active.retain(|l| !l.is_expired(now));
        let mut granted = Vec::new();
        let pending = entry.queue.drain_all();
        let mut still_waiting = Vec::new();

        for req in pending {
            let conflicts = Self::conflicts_with_active(&entry.active, req.lock_type, req.scope, now);
            if conflicts.is_empty() {
                let lock = Lock {
                    lock_id: id_generator::lock_id(now),
                    session_id: req.session_id.clone(),
                    client_id: req.client_id.clone(),
                    lock_type: req.lock_type,
                    scope: req.scope,
                    acquired_at: now,
                    expires_at: now + req.timeout_ms,
                    reason: req.reason.clone(),
                };
                entry.active.push(lock.clone());
                granted.push(lock);
            } else {
                still_waiting.push(req);
            }
        }
        for req in still_waiting {
            entry.queue.push(req);
        }
        granted
    }

    /// Admin operation: purges all locks and the wait queue for a session.
    pub fn force_release(&self, session_id: &str) {
        let mut sessions = self.sessions.lock();
        sessions.remove(session_id);
    }

    /// Cascading release of every lock held by `client_id` across all
    /// sessions, used by `ClientRegistry::unregister` (P10).
    pub fn release_all_for_client(&self, client_id: &str, now: i64) {
        let mut sessions = self.sessions.lock();
        for (_, entry) in sessions.iter_mut() {
            entry.active.retain(|l| l.client_id != client_id);
            let _ = self.drain_queue(entry, now);
        }
    }

    /// Cleanup sweep (intended to run every 60s): drops expired locks across
    /// all sessions and re-evaluates each session's queue.
    pub fn sweep_expired(&self, now: i64) {
        let mut sessions = self.sessions.lock();
        for (_, entry) in sessions.iter_mut() {
            let _ = self.drain_queue(entry, now);
        }
    }

    pub fn active_locks(&self, session_id: &str, now: i64) -> Vec<Lock> {
        self.sessions
            .lock()
            .get(session_id)
            .map(|e| e.active.iter().filter(|l| !l.is_expired(now)).cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(session: &str, client: &str, lock_type: LockType, level: AccessLevel) -> AcquireRequest {
        AcquireRequest {
            session_id: session.to_string(),
            client_id: client.to_string(),
            lock_type,
            scope: LockScope::FullSession,
            access_level: level,
            timeout_ms: 30_000,
            reason: "test".to_string(),
        }
    }

    #[test]
    fn second_writer_conflicts_and_queues() {
        let mgr = LockManager::new();
        let a = mgr
            .acquire(req("s1", "A", LockType::Write, AccessLevel::Write), 0)
            .unwrap();
        let err = mgr
            .acquire(req("s1", "B", LockType::Write, AccessLevel::Write), 0)
            .unwrap_err();
        match err {
            LockError::Conflict { conflicting_locks, wait_time_ms } => {
                assert_eq!(conflicting_locks, vec![a]);
                assert!(wait_time_ms >= 0);
            }
            _ => panic!("expected conflict"),
        }
    }

    #[test]
    fn release_grants_queued_request() {
        let mgr = LockManager::new();
        let a = mgr
            .acquire(req("s1", "A", LockType::Write, AccessLevel::Write), 0)
            .unwrap();
        let _ = mgr.acquire(req("s1", "B", LockType::Write, AccessLevel::Write), 0);
        let granted = mgr.release("s1", &a.lock_id, 10).unwrap();
        assert_eq!(granted.len(), 1);
        assert_eq!(granted[0].client_id, "B");
    }

    #[test]
    fn read_locks_stack_without_conflict() {
        let mgr = LockManager::new();
        let mut r = req("s1", "A", LockType::Read, AccessLevel::Read);
        r.scope = LockScope::StepExecution;
        mgr.acquire(r, 0).unwrap();
        let mut r2 = req("s1", "B", LockType::Read, AccessLevel::Read);
        r2.scope = LockScope::StepExecution;
        assert!(mgr.acquire(r2, 0).is_ok());
    }

    #[test]
    fn insufficient_access_level_denied() {
        let mgr = LockManager::new();
        let err = mgr
            .acquire(req("s1", "A", LockType::Exclusive, AccessLevel::Write), 0)
            .unwrap_err();
        assert!(matches!(err, LockError::PermissionDenied(_)));
    }

    #[test]
    fn release_unknown_lock_not_found() {
        let mgr = LockManager::new();
        assert!(matches!(mgr.release("s1", "ghost", 0), Err(LockError::NotFound(_))));
    }

    #[test]
    fn unregister_releases_all_client_locks() {
        let mgr = LockManager::new();
        mgr.acquire(req("s1", "A", LockType::Write, AccessLevel::Write), 0)
            .unwrap();
        mgr.release_all_for_client("A", 0);
        assert!(mgr.active_locks("s1", 0).is_empty());
    }
}
