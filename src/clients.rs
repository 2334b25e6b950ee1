//! C7: client connection lifecycle, access levels, idle eviction.
//!
//! Grounded on the teacher's `runtimes::session::SessionState` lifecycle
//! shape, generalized to a registry of many clients across many sessions.

use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::locks::LockManager;
use crate::model::{AccessLevel, ClientSession};

#[derive(Debug, Error, Diagnostic)]
pub enum ClientRegistryError {
    #[error("capacity exceeded: session {0} already has the maximum number of clients")]
    #[diagnostic(code(reasoning_sessions::clients::capacity_exceeded))]
    CapacityExceeded(String),

    #[error("client not found: {0}")]
    #[diagnostic(code(reasoning_sessions::clients::not_found))]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ClientRegistryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
    Admin,
}

impl Operation {
    fn required_level(self) -> AccessLevel {
        match self {
            Operation::Read => AccessLevel::Read,
            Operation::Write => AccessLevel::Write,
            Operation::Admin => AccessLevel::Admin,
        }
    }
}

/// Owns the live `ClientSession` table. A client is bound to exactly one
/// session (I7); lock release on unregister is delegated to `LockManager`,
/// avoiding a cyclic client<->lock reference (§9).
pub struct ClientRegistry {
    clients: Mutex<FxHashMap<String, ClientSession>>,
    max_clients_per_session: usize,
}

impl ClientRegistry {
    pub fn new(max_clients_per_session: usize) -> Self {
        Self {
            clients: Mutex::new(FxHashMap::default()),
            max_clients_per_session,
        }
    }

    pub fn register(
        &self,
        client_id: &str,
        session_id: &str,
        info: serde_json::Map<String, serde_json::Value>,
        access_level: AccessLevel,
        now: i64,
    ) -> Result<()> {
        let mut clients = self.clients.lock();
        if !clients.contains_key(client_id) {
            let active_in_session = clients.values().filter(|c| c.session_id == session_id).count();
            if active_in_session >= self.max_clients_per_session {
                return Err(ClientRegistryError::CapacityExceeded(session_id.to_string()));
            }
        }
        clients.insert(
            client_id.to_string(),
            ClientSession::new(client_id, session_id, now, access_level, info),
        );
        Ok(())
    }

    /// Removes the client; cascades to `lock_manager` to release every lock
    /// the client held (P10).
    pub fn unregister(&self, client_id: &str, lock_manager: &LockManager, now: i64) -> Result<()> {
        let mut clients = self.clients.lock();
        clients
            .remove(client_id)
            .ok_or_else(|| ClientRegistryError::NotFound(client_id.to_string()))?;
        drop(clients);
        lock_manager.release_all_for_client(client_id, now);
        Ok(())
    }

    pub fn update_activity(&self, client_id: &str, now: i64) -> Result<()> {
        let mut clients = self.clients.lock();
        let client = clients
            .get_mut(client_id)
            .ok_or_else(|| ClientRegistryError::NotFound(client_id.to_string()))?;
        client.touch(now);
        Ok(())
    }

    /// Whether the client's access level dominates `op` under
    /// `admin > write > read`.
    pub fn can_access(&self, client_id: &str, session_id: &str, op: Operation) -> bool {
        let clients = self.clients.lock();
        match clients.get(client_id) {
            Some(client) if client.session_id == session_id => {
                client.access_level.dominates(op.required_level())
            }
            _ => false,
        }
    }

    pub fn get(&self, client_id: &str) -> Option<ClientSession> {
        self.clients.lock().get(client_id).cloned()
    }

    /// Clients idle longer than `client_timeout_ms`, for the cleanup sweep
    /// to evict (cascading lock release is the caller's responsibility).
    pub fn idle_clients(&self, now: i64, client_timeout_ms: i64) -> Vec<String> {
        self.clients
            .lock()
            .values()
            .filter(|c| c.is_idle(now, client_timeout_ms))
            .map(|c| c.client_id.clone())
            .collect()
    }

    pub fn active_client_count(&self, session_id: &str) -> usize {
        self.clients
            .lock()
            .values()
            .filter(|c| c.session_id == session_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_exceeded_rejects_new_client() {
        let registry = ClientRegistry::new(1);
        registry
            .register("a", "s1", Default::default(), AccessLevel::Read, 0)
            .unwrap();
        let err = registry
            .register("b", "s1", Default::default(), AccessLevel::Read, 0)
            .unwrap_err();
        assert!(matches!(err, ClientRegistryError::CapacityExceeded(_)));
    }

    #[test]
    fn access_level_dominance() {
        let registry = ClientRegistry::new(5);
        registry
            .register("a", "s1", Default::default(), AccessLevel::Write, 0)
            .unwrap();
        assert!(registry.can_access("a", "s1", Operation::Write));
        assert!(!registry.can_access("a", "s1", Operation::Admin));
    }

    #[test]
    fn unregister_cascades_lock_release() {
        use crate::locks::{AcquireRequest, LockManager};
        use crate::model::{LockScope, LockType};

        let registry = ClientRegistry::new(5);
        let locks = LockManager::new();
        registry
            .register("a", "s1", Default::default(), AccessLevel::Write, 0)
            .unwrap();
        locks
            .acquire(
                AcquireRequest {
                    session_id: "s1".to_string(),
                    client_id: "a".to_string(),
                    lock_type: LockType::Write,
                    scope: LockScope::FullSession,
                    access_level: AccessLevel::Write,
                    timeout_ms: 10_000,
                    reason: String::new(),
                },
                0,
            )
            .unwrap();
        registry.unregister("a", &locks, 0).unwrap();
        assert!(locks.active_locks("s1", 0).is_empty());
    }
}
