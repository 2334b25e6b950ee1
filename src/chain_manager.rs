//! C10: the orchestrator. `ChainManager` is the only thing callers outside
//! this crate talk to — it composes the data model with C1-C9, C11 behind
//! one coherent API, grounded on the teacher's `runtimes::runner::AppRunner`
//! (a struct owning a session table plus every collaborating subsystem, with
//! `RunnerError` aggregating their failures).
//!
//! Each session's live state lives behind its own `tokio::sync::Mutex`
//! (`ActiveSession`), reached through a `parking_lot::RwLock`-guarded table
//! keyed by session id — sharded locking rather than one big mutex, so two
//! sessions never block each other.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex as SyncMutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::blob_store::BlobStore;
use crate::checkpoints::{self, CheckpointStore};
use crate::clients::{ClientRegistry, Operation};
use crate::codec;
use crate::conflict::{self, merge, ConflictStats, PartialUpdate};
use crate::config::SessionManagerConfig;
use crate::error::{CoreError, CoreResult};
use crate::event_bus::{Event, EventBus, EventData, EventType};
use crate::locks::{AcquireRequest, LockError, LockManager};
use crate::model::{
    AccessLevel, Checkpoint, ClientSession, Complexity, ConflictResolution, Lock, LockScope, LockType, Problem,
    ReasoningState, ReasoningStateBuilder, ResolutionStrategy, SessionMetadata, SessionStatus, Step, StepStatus,
    Strategy, StrategyName, TimeoutConfig,
};
use crate::recovery::{self, RecoveryContext, RecoveryOptions, RecoveryResult, SuccessRateTracker};
use crate::step_executor::{StepExecutionOutcome, StepExecutor};
use crate::utils::id_generator;
use crate::validation::{self, HealthStatus, ValidationReport};

/// `ChainManager`'s own view of a live session: the managed object plus its
/// sidecar metadata, updated together under one lock.
struct ActiveSession {
    state: ReasoningState,
    metadata: SessionMetadata,
}

/// A write a client has proposed but not yet resolved against a concurrent
/// writer, keyed per-session. Grounded on conflict detection needing a
/// three-way base (§4.8): we remember the most recent *other* client's
/// pending write so the next call from a different client has something to
/// diff against.
#[derive(Clone)]
struct PendingUpdate {
    client_id: String,
    fields: serde_json::Map<String, Value>,
    last_modified: i64,
}

/// Outcome of one `ChainManager::execute_next_step` call.
#[derive(Debug, Clone)]
pub struct ExecuteStepOutcome {
    pub ok: bool,
    pub updated_state: Option<ReasoningState>,
    pub error: Option<String>,
}

fn date_prefix(ts_ms: i64) -> String {
    DateTime::from_timestamp_millis(ts_ms)
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%d")
        .to_string()
}

fn to_utc(now_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(now_ms).unwrap_or_else(Utc::now)
}

fn state_key(session_id: &str, created_at: i64) -> String {
    format!("reasoning-sessions/active/{}/{session_id}/reasoning-state.json", date_prefix(created_at))
}

fn metadata_key(session_id: &str) -> String {
    format!("reasoning-sessions/metadata/{session_id}.json")
}

fn backup_src_prefix(session_id: &str, created_at: i64) -> String {
    format!("reasoning-sessions/active/{}/{session_id}", date_prefix(created_at))
}

fn backup_dst_prefix(session_id: &str, now_ms: i64) -> String {
    format!("reasoning-sessions/backups/{session_id}-{now_ms}")
}

fn summarize(problem: &Problem) -> String {
    const MAX: usize = 160;
    if problem.description.len() <= MAX {
        problem.description.clone()
    } else {
        format!("{}...", &problem.description[..MAX])
    }
}

fn strategy_label(name: StrategyName) -> String {
    serde_json::to_value(name)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Routes an applied field into the state. Known top-level fields
/// (`currentStep`/`steps`/`problem`/`strategy`) are typed writes; anything
/// else lands in `problem.context`, the one deliberately open-ended bag in
/// the data model (§9).
fn apply_fields(state: &mut ReasoningState, fields: &serde_json::Map<String, Value>) {
    for (key, value) in fields {
        match key.as_str() {
            "currentStep" => {
                if let Some(n) = value.as_u64() {
                    state.current_step = n as usize;
                }
            }
            "steps" => {
                if let Ok(steps) = serde_json::from_value::<Vec<Step>>(value.clone()) {
                    state.steps = steps;
                }
            }
            "problem" => {
                if let Ok(problem) = serde_json::from_value::<Problem>(value.clone()) {
                    state.problem = problem;
                }
            }
            "strategy" => {
                if let Ok(strategy) = serde_json::from_value::<Strategy>(value.clone()) {
                    state.strategy = strategy;
                }
            }
            other => {
                state.problem.context.insert(other.to_string(), value.clone());
            }
        }
    }
}

/// A conservative projection of the state fields conflict detection cares
/// about, used as the three-way merge's `base`. Deliberately omits derived
/// fields like `totalSteps` — only fields `apply_fields` knows how to route
/// back onto the state belong here, or a merge would round-trip them into
/// `problem.context` as stray keys.
fn state_to_map(state: &ReasoningState) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    map.insert("currentStep".to_string(), Value::from(state.current_step));
    for (k, v) in &state.problem.context {
        map.insert(k.clone(), v.clone());
    }
    map
}

/// RAII guard releasing a lock on drop, so every exit path out of
/// [`ChainManager::execute_next_step_with_lock`] (success, error, panic
/// unwind) releases it exactly once — the counterpart to the teacher's
/// scope-guard idiom, made possible because [`LockManager::release`] is
/// synchronous.
struct LockGuard<'a> {
    manager: &'a LockManager,
    session_id: String,
    lock_id: String,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let _ = self.manager.release(&self.session_id, &self.lock_id, 0);
    }
}

/// Orchestrates every component behind one API: creation, stepped and bulk
/// execution, checkpoint rollback, persistence, health/recovery, client and
/// lock lifecycle, and conflict-aware concurrent writes.
pub struct ChainManager {
    active: RwLock<FxHashMap<String, Arc<AsyncMutex<ActiveSession>>>>,
    locks: LockManager,
    clients: ClientRegistry,
    blob_store: Arc<dyn BlobStore>,
    checkpoint_store: Arc<dyn CheckpointStore>,
    events: Arc<EventBus>,
    step_executor: Arc<dyn StepExecutor>,
    config: SessionManagerConfig,
    conflict_stats: ConflictStats,
    pending_updates: SyncMutex<FxHashMap<String, PendingUpdate>>,
    recovery_ladder: Vec<Box<dyn recovery::RecoveryStrategy>>,
    recovery_tracker: AsyncMutex<SuccessRateTracker>,
}

impl ChainManager {
    pub fn new(
        config: SessionManagerConfig,
        blob_store: Arc<dyn BlobStore>,
        checkpoint_store: Arc<dyn CheckpointStore>,
        events: Arc<EventBus>,
        step_executor: Arc<dyn StepExecutor>,
    ) -> Self {
        Self {
            active: RwLock::new(FxHashMap::default()),
            locks: LockManager::new(),
            clients: ClientRegistry::new(config.max_clients_per_session),
            blob_store,
            checkpoint_store,
            events,
            step_executor,
            config,
            conflict_stats: ConflictStats::default(),
            pending_updates: SyncMutex::new(FxHashMap::default()),
            recovery_ladder: recovery::default_ladder(),
            recovery_tracker: AsyncMutex::new(SuccessRateTracker::default()),
        }
    }

    /// Convenience constructor over the in-memory implementations of every
    /// collaborator, for tests and small deployments.
    pub fn new_in_memory(config: SessionManagerConfig) -> Self {
        Self::new(
            config,
            Arc::new(crate::blob_store::MemoryBlobStore::new()),
            Arc::new(crate::checkpoints::InMemoryCheckpointStore::new()),
            Arc::new(EventBus::default()),
            Arc::new(crate::step_executor::NoopStepExecutor),
        )
    }

    pub fn config(&self) -> &SessionManagerConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn conflict_stats(&self) -> &ConflictStats {
        &self.conflict_stats
    }

    /// Lists every persisted session's metadata whose status is `Active` or
    /// `Paused`, the candidate pool [`crate::restoration`] starts from.
    pub async fn list_restorable_metadata(&self) -> CoreResult<Vec<SessionMetadata>> {
        let keys = self.blob_store.list_prefix("reasoning-sessions/metadata/").await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let bytes = self.blob_store.get(&key).await?;
            let metadata: SessionMetadata = serde_json::from_slice(&bytes).map_err(|e| CoreError::Corrupt(e.to_string()))?;
            if matches!(metadata.status, SessionStatus::Active | SessionStatus::Paused) {
                out.push(metadata);
            }
        }
        Ok(out)
    }

    fn get_active(&self, session_id: &str) -> CoreResult<Arc<AsyncMutex<ActiveSession>>> {
        self.active
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("session {session_id}")))
    }

    async fn persist(&self, state: &ReasoningState, metadata: &SessionMetadata, now_ms: i64) -> CoreResult<()> {
        let bytes = codec::encode(state, now_ms)?;
        self.blob_store.put(&state_key(&state.id, state.created_at), bytes).await?;
        let meta_bytes = serde_json::to_vec(metadata).map_err(|e| CoreError::Internal(e.to_string()))?;
        self.blob_store.put(&metadata_key(&state.id), meta_bytes).await?;
        Ok(())
    }

    fn fresh_metadata(&self, state: &ReasoningState, now_ms: i64) -> SessionMetadata {
        SessionMetadata::new(
            state.id.clone(),
            now_ms,
            summarize(&state.problem),
            strategy_label(state.strategy.name),
            state.total_steps(),
            TimeoutConfig {
                active_timeout_ms: self.config.active_timeout_ms,
                paused_timeout_ms: self.config.paused_timeout_ms,
                completed_timeout_ms: self.config.completed_timeout_ms,
            },
        )
    }

    /// Whether completing the step at `idx` should trigger an auto
    /// checkpoint (§4.10 significance rule, open question resolved in
    /// DESIGN.md): no dependencies, OR >=2 dependents, OR `idx % 5 == 0`
    /// (deliberately including index 0), OR the problem is high-complexity.
    fn is_significant(&self, state: &ReasoningState, idx: usize) -> bool {
        let step = &state.steps[idx];
        let no_deps = step.dependencies.is_empty();
        let dependents = state.steps.iter().filter(|s| s.dependencies.contains(&step.id)).count();
        let high_complexity = matches!(state.problem.complexity, Complexity::Complex | Complexity::Expert);
        no_deps || dependents >= 2 || idx % 5 == 0 || high_complexity
    }

    /// Creates a new reasoning session: validates the candidate state,
    /// rejects on any unrepairable critical/error issue, stamps an initial
    /// "Session created" checkpoint, persists, and registers it as active.
    pub async fn create_state(
        &self,
        problem: Problem,
        steps: Vec<Step>,
        strategy: Strategy,
        now_ms: i64,
    ) -> CoreResult<ReasoningState> {
        let mut state = ReasoningStateBuilder::new(now_ms)
            .with_id(id_generator::session_id(now_ms))
            .with_problem(problem)
            .with_strategy(strategy)
            .with_steps(steps)
            .build();

        let report = validation::validate(&state);
        let blocking: Vec<&str> = report
            .issues
            .iter()
            .filter(|i| matches!(i.severity, validation::Severity::Critical | validation::Severity::Error) && !i.can_repair)
            .map(|i| i.code.as_str())
            .collect();
        if !blocking.is_empty() {
            return Err(CoreError::InvalidInput(format!(
                "rejected: {} unrepairable issue(s): {}",
                blocking.len(),
                blocking.join(", ")
            )));
        }

        let checkpoint = Checkpoint::new(id_generator::event_id(now_ms), now_ms, 0, &state.steps, "Session created", true);
        state.checkpoints.push(checkpoint.clone());
        state.trim_checkpoints(self.config.checkpoint_retention);

        let mut metadata = self.fresh_metadata(&state, now_ms);
        metadata.checkpoint_count = state.checkpoints.len();

        self.persist(&state, &metadata, now_ms).await?;
        self.checkpoint_store
            .append(&state.id, checkpoint, self.config.checkpoint_retention)
            .await?;

        self.active
            .write()
            .insert(state.id.clone(), Arc::new(AsyncMutex::new(ActiveSession { state: state.clone(), metadata })));

        self.events
            .emit(Event::new(
                id_generator::event_id(now_ms),
                EventType::SessionCreated,
                state.id.clone(),
                EventData::Session { status: "active".to_string() },
                to_utc(now_ms),
            ))
            .await;

        Ok(state)
    }

    /// Executes the step at `currentStep`, if any remain. Blocked
    /// dependencies produce `ok: false` with an error naming the
    /// unsatisfied dependency (P3) without mutating the step; a successful
    /// step advances `currentStep` and may take an auto checkpoint.
    pub async fn execute_next_step(&self, session_id: &str, now_ms: i64) -> CoreResult<ExecuteStepOutcome> {
        let entry = self.get_active(session_id)?;
        let mut guard = entry.lock().await;

        if guard.state.current_step >= guard.state.total_steps() {
            return Ok(ExecuteStepOutcome { ok: true, updated_state: Some(guard.state.clone()), error: None });
        }

        let idx = guard.state.current_step;
        let completed: BTreeSet<String> = guard
            .state
            .steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Completed | StepStatus::Skipped))
            .map(|s| s.id.clone())
            .collect();

        if !guard.state.steps[idx].is_dependency_satisfied_by(&completed) {
            let blocking: Vec<String> = guard.state.steps[idx]
                .dependencies
                .iter()
                .filter(|d| !completed.contains(*d))
                .cloned()
                .collect();
            let message = format!(
                "step {} blocked: dependency {} not satisfied",
                guard.state.steps[idx].id,
                blocking.join(", ")
            );
            return Ok(ExecuteStepOutcome { ok: false, updated_state: None, error: Some(message) });
        }

        guard.state.steps[idx].status = StepStatus::InProgress;
        guard.state.steps[idx].timestamp = now_ms;
        let started_at = now_ms;

        let step_snapshot = guard.state.steps[idx].clone();
        let context = guard.state.problem.context.clone();
        let outcome = tokio::time::timeout(
            Duration::from_millis(self.config.step_timeout_ms),
            self.step_executor.execute(&step_snapshot, &context),
        )
        .await
        .unwrap_or_else(|_| StepExecutionOutcome::failure(vec!["step execution timed out".to_string()]));

        if outcome.ok {
            guard.state.steps[idx].status = StepStatus::Completed;
            guard.state.steps[idx].outputs = outcome.outputs.clone();
            guard.state.steps[idx].duration_ms = Some((now_ms - started_at).max(0) as u64);
            guard.state.current_step += 1;
        } else {
            guard.state.steps[idx].status = StepStatus::Failed;
            guard.state.steps[idx].errors = outcome.errors.clone();
        }
        guard.state.last_modified = now_ms;

        let mut checkpoint_created: Option<Checkpoint> = None;
        if outcome.ok && self.is_significant(&guard.state, idx) {
            let checkpoint = Checkpoint::new(
                id_generator::event_id(now_ms),
                now_ms,
                guard.state.current_step,
                &guard.state.steps,
                "auto",
                true,
            );
            guard.state.checkpoints.push(checkpoint.clone());
            guard.state.trim_checkpoints(self.config.checkpoint_retention);
            self.checkpoint_store
                .append(session_id, checkpoint.clone(), self.config.checkpoint_retention)
                .await?;
            checkpoint_created = Some(checkpoint);
        }

        guard.metadata.current_step = guard.state.current_step;
        guard.metadata.checkpoint_count = guard.state.checkpoints.len();
        guard.metadata.touch(now_ms);
        self.persist(&guard.state, &guard.metadata, now_ms).await?;

        let completed_now = outcome.ok && guard.state.current_step >= guard.state.total_steps();
        let snapshot = guard.state.clone();
        drop(guard);

        if let Some(checkpoint) = checkpoint_created {
            self.events
                .emit(Event::new(
                    id_generator::event_id(now_ms),
                    EventType::CheckpointCreated,
                    session_id,
                    EventData::Checkpoint { checkpoint_id: checkpoint.id, auto: checkpoint.auto },
                    to_utc(now_ms),
                ))
                .await;
        }

        self.events
            .emit(Event::new(
                id_generator::event_id(now_ms),
                if outcome.ok { EventType::SessionUpdated } else { EventType::SessionFailed },
                session_id,
                EventData::Session { status: if outcome.ok { "active".to_string() } else { "failed_step".to_string() } },
                to_utc(now_ms),
            ))
            .await;

        if completed_now {
            self.events
                .emit(Event::new(
                    id_generator::event_id(now_ms),
                    EventType::SessionCompleted,
                    session_id,
                    EventData::Session { status: "completed".to_string() },
                    to_utc(now_ms),
                ))
                .await;
        }

        Ok(ExecuteStepOutcome {
            ok: outcome.ok,
            updated_state: Some(snapshot),
            error: if outcome.ok { None } else { Some(outcome.errors.join("; ")) },
        })
    }

    /// Drives `execute_next_step` until every step is terminal or one blocks
    /// or fails, taking a final non-auto checkpoint on completion.
    pub async fn execute_all_steps(&self, session_id: &str, now_ms: i64) -> CoreResult<ReasoningState> {
        loop {
            let outcome = self.execute_next_step(session_id, now_ms).await?;
            if let Some(err) = outcome.error {
                return Err(CoreError::InvalidInput(err));
            }
            let state = outcome.updated_state.expect("ok outcome always carries state");
            if state.current_step >= state.total_steps() {
                let entry = self.get_active(session_id)?;
                let mut guard = entry.lock().await;
                let checkpoint = Checkpoint::new(
                    id_generator::event_id(now_ms),
                    now_ms,
                    guard.state.current_step,
                    &guard.state.steps,
                    "Execution complete",
                    false,
                );
                guard.state.checkpoints.push(checkpoint.clone());
                guard.state.trim_checkpoints(self.config.checkpoint_retention);
                self.checkpoint_store
                    .append(session_id, checkpoint, self.config.checkpoint_retention)
                    .await?;
                guard.metadata.checkpoint_count = guard.state.checkpoints.len();
                self.persist(&guard.state, &guard.metadata, now_ms).await?;
                return Ok(guard.state.clone());
            }
        }
    }

    /// Rolls the session back to a named checkpoint's snapshot (C4).
    pub async fn restore_from_checkpoint(&self, session_id: &str, checkpoint_id: &str, now_ms: i64) -> CoreResult<ReasoningState> {
        let entry = self.get_active(session_id)?;
        let mut guard = entry.lock().await;
        let checkpoint = guard
            .state
            .checkpoints
            .iter()
            .find(|c| c.id == checkpoint_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("checkpoint {checkpoint_id}")))?;

        checkpoints::restore_from_checkpoint(&mut guard.state, &checkpoint);
        guard.state.last_modified = now_ms;
        guard.metadata.current_step = guard.state.current_step;
        guard.metadata.touch(now_ms);
        self.persist(&guard.state, &guard.metadata, now_ms).await?;
        let snapshot = guard.state.clone();
        drop(guard);

        self.events
            .emit(Event::new(
                id_generator::event_id(now_ms),
                EventType::SessionUpdated,
                session_id,
                EventData::Session { status: "restored".to_string() },
                to_utc(now_ms),
            ))
            .await;
        Ok(snapshot)
    }

    /// Finalizes a session as `Completed`/`Archived`, evicts it from the
    /// active table, and force-releases any outstanding locks.
    pub async fn remove(&self, session_id: &str, final_status: SessionStatus, now_ms: i64) -> CoreResult<()> {
        if !matches!(final_status, SessionStatus::Completed | SessionStatus::Archived) {
            return Err(CoreError::InvalidInput("remove requires a terminal status (completed or archived)".to_string()));
        }
        let entry = self.get_active(session_id)?;
        {
            let mut guard = entry.lock().await;
            guard.metadata.set_status(final_status, now_ms);
            self.persist(&guard.state, &guard.metadata, now_ms).await?;
        }
        self.active.write().remove(session_id);
        self.locks.force_release(session_id);
        self.pending_updates.lock().remove(session_id);
        Ok(())
    }

    /// Loads a session from persistence if it is not already active.
    /// Corruption is surfaced to the caller as `Corrupt`/`UnsupportedVersion`
    /// here — unlike `RestorationPlanner`, direct `load` never auto-recovers
    /// (§7).
    pub async fn load(&self, session_id: &str, now_ms: i64) -> CoreResult<ReasoningState> {
        if let Some(entry) = self.active.read().get(session_id).cloned() {
            return Ok(entry.lock().await.state.clone());
        }

        let meta_bytes = self.blob_store.get(&metadata_key(session_id)).await?;
        let mut metadata: SessionMetadata = serde_json::from_slice(&meta_bytes).map_err(|e| CoreError::Corrupt(e.to_string()))?;
        let bytes = self.blob_store.get(&state_key(session_id, metadata.created_at)).await?;
        let state = codec::decode(&bytes, now_ms)?;

        if metadata.status == SessionStatus::Paused {
            metadata.set_status(SessionStatus::Active, now_ms);
        }
        metadata.touch(now_ms);
        self.persist(&state, &metadata, now_ms).await?;
        self.active
            .write()
            .insert(session_id.to_string(), Arc::new(AsyncMutex::new(ActiveSession { state: state.clone(), metadata })));
        Ok(state)
    }

    /// Persists the active session's current state, optionally snapshotting
    /// the whole per-day prefix to a timestamped backup path first.
    pub async fn save(&self, session_id: &str, backup: bool, now_ms: i64) -> CoreResult<()> {
        let entry = self.get_active(session_id)?;
        let guard = entry.lock().await;
        if backup {
            let src = backup_src_prefix(session_id, guard.state.created_at);
            let dst = backup_dst_prefix(session_id, now_ms);
            self.blob_store.copy_tree(&src, &dst).await?;
        }
        self.persist(&guard.state, &guard.metadata, now_ms).await?;
        Ok(())
    }

    /// Resets every step from `from_step` (default: `currentStep`) onward to
    /// `Pending`, clearing their outputs/errors, then takes a "Session
    /// resumed" checkpoint and reactivates the session.
    pub async fn resume(&self, session_id: &str, from_step: Option<usize>, now_ms: i64) -> CoreResult<ReasoningState> {
        let entry = self.get_active(session_id)?;
        let mut guard = entry.lock().await;
        let total = guard.state.total_steps();
        let from = from_step.unwrap_or(guard.state.current_step);
        if from > total {
            return Err(CoreError::InvalidInput(format!("fromStep {from} exceeds totalSteps {total}")));
        }

        for step in guard.state.steps.iter_mut().skip(from) {
            step.status = StepStatus::Pending;
            step.outputs.clear();
            step.errors.clear();
            step.duration_ms = None;
        }
        guard.state.current_step = from;
        guard.state.last_modified = now_ms;

        let checkpoint = Checkpoint::new(
            id_generator::event_id(now_ms),
            now_ms,
            guard.state.current_step,
            &guard.state.steps,
            "Session resumed",
            false,
        );
        guard.state.checkpoints.push(checkpoint.clone());
        guard.state.trim_checkpoints(self.config.checkpoint_retention);
        self.checkpoint_store
            .append(session_id, checkpoint, self.config.checkpoint_retention)
            .await?;

        guard.metadata.set_status(SessionStatus::Active, now_ms);
        guard.metadata.current_step = guard.state.current_step;
        guard.metadata.checkpoint_count = guard.state.checkpoints.len();
        self.persist(&guard.state, &guard.metadata, now_ms).await?;
        Ok(guard.state.clone())
    }

    /// Runs C3 over the active session. With `auto_repair`, applies every
    /// repairable issue's fix to an in-memory copy and persists it if any
    /// repair was made. Emits `health_check_failed` on Critical/Corrupted.
    pub async fn validate_health(&self, session_id: &str, auto_repair: bool, now_ms: i64) -> CoreResult<ValidationReport> {
        let entry = self.get_active(session_id)?;
        let mut guard = entry.lock().await;

        let report = if auto_repair {
            let (repaired, report) = validation::validate_and_repair(&guard.state);
            if report.repaired_issue_count() > 0 {
                guard.state = repaired;
                guard.state.last_modified = now_ms;
                guard.metadata.touch(now_ms);
                self.persist(&guard.state, &guard.metadata, now_ms).await?;
            }
            report
        } else {
            validation::validate(&guard.state)
        };
        drop(guard);

        if matches!(report.status, HealthStatus::Critical | HealthStatus::Corrupted) {
            self.events
                .emit(Event::new(
                    id_generator::event_id(now_ms),
                    EventType::HealthCheckFailed,
                    session_id,
                    EventData::Health { health_score: report.health_score, issue_count: report.issues.len() },
                    to_utc(now_ms),
                ))
                .await;
        }
        Ok(report)
    }

    /// Runs the C5 recovery ladder for a session that cannot be loaded
    /// cleanly, swapping the active entry in for the recovered state on
    /// success.
    pub async fn recover(&self, session_id: &str, now_ms: i64) -> CoreResult<RecoveryResult> {
        let metadata_present = self.blob_store.get(&metadata_key(session_id)).await.is_ok();
        let last_known_state = match self.active.read().get(session_id).cloned() {
            Some(entry) => Some(entry.lock().await.state.clone()),
            None => None,
        };
        let checkpoints = self.checkpoint_store.list(session_id).await?;
        let created_at_guess = last_known_state.as_ref().map(|s| s.created_at).unwrap_or(now_ms);

        self.events
            .emit(Event::new(
                id_generator::event_id(now_ms),
                EventType::RecoveryStarted,
                session_id,
                EventData::Recovery { strategy_name: String::new(), confidence: None },
                to_utc(now_ms),
            ))
            .await;

        let ctx = RecoveryContext {
            session_id: session_id.to_string(),
            state_blob_key: state_key(session_id, created_at_guess),
            metadata_present,
            checkpoints,
            last_known_state,
            now_ms,
        };
        let options = RecoveryOptions {
            max_retry_attempts: self.config.max_retry_attempts,
            timeout_ms: self.config.recovery_timeout_ms,
            retry_delay_ms: self.config.retry_delay_ms,
            backoff_multiplier: self.config.backoff_multiplier,
        };

        let mut tracker = self.recovery_tracker.lock().await;
        let result = recovery::recover(&self.recovery_ladder, &ctx, self.blob_store.as_ref(), options, &mut tracker).await?;
        drop(tracker);

        if let Some(state) = &result.state {
            let metadata = self.fresh_metadata(state, now_ms);
            self.persist(state, &metadata, now_ms).await?;
            self.active
                .write()
                .insert(session_id.to_string(), Arc::new(AsyncMutex::new(ActiveSession { state: state.clone(), metadata })));
        }

        self.events
            .emit(Event::new(
                id_generator::event_id(now_ms),
                if result.ok { EventType::RecoverySucceeded } else { EventType::RecoveryFailed },
                session_id,
                EventData::Recovery { strategy_name: result.strategy_name.clone(), confidence: Some(result.confidence) },
                to_utc(now_ms),
            ))
            .await;

        Ok(result)
    }

    // -- client lifecycle (C7), pass-through plus event emission --

    pub async fn register_client(
        &self,
        client_id: &str,
        session_id: &str,
        info: serde_json::Map<String, Value>,
        access_level: AccessLevel,
        now_ms: i64,
    ) -> CoreResult<()> {
        self.clients.register(client_id, session_id, info, access_level, now_ms)?;
        self.events
            .emit(Event::new(
                id_generator::event_id(now_ms),
                EventType::ClientConnected,
                session_id,
                EventData::Client { client_id: client_id.to_string() },
                to_utc(now_ms),
            ))
            .await;
        Ok(())
    }

    pub async fn unregister_client(&self, client_id: &str, now_ms: i64) -> CoreResult<()> {
        let session_id = self
            .clients
            .get(client_id)
            .map(|c| c.session_id)
            .ok_or_else(|| CoreError::NotFound(format!("client {client_id}")))?;
        self.clients.unregister(client_id, &self.locks, now_ms)?;
        self.events
            .emit(Event::new(
                id_generator::event_id(now_ms),
                EventType::ClientDisconnected,
                session_id,
                EventData::Client { client_id: client_id.to_string() },
                to_utc(now_ms),
            ))
            .await;
        Ok(())
    }

    pub fn client(&self, client_id: &str) -> Option<ClientSession> {
        self.clients.get(client_id)
    }

    pub fn can_client_access_session(&self, client_id: &str, session_id: &str, op: Operation) -> bool {
        self.clients.can_access(client_id, session_id, op)
    }

    // -- lock lifecycle (C6), pass-through plus event emission --

    pub async fn acquire_lock(
        &self,
        session_id: &str,
        client_id: &str,
        lock_type: LockType,
        scope: LockScope,
        reason: &str,
        now_ms: i64,
    ) -> CoreResult<Lock> {
        let access_level = self
            .clients
            .get(client_id)
            .map(|c| c.access_level)
            .ok_or_else(|| CoreError::NotFound(format!("client {client_id}")))?;

        let request = AcquireRequest {
            session_id: session_id.to_string(),
            client_id: client_id.to_string(),
            lock_type,
            scope,
            access_level,
            timeout_ms: self.config.lock_timeout_ms,
            reason: reason.to_string(),
        };

        match self.locks.acquire(request, now_ms) {
            Ok(lock) => {
                self.events
                    .emit(Event::new(
                        id_generator::event_id(now_ms),
                        EventType::LockAcquired,
                        session_id,
                        EventData::Lock { lock_id: lock.lock_id.clone(), client_id: client_id.to_string(), wait_time_ms: None },
                        to_utc(now_ms),
                    ))
                    .await;
                Ok(lock)
            }
            Err(LockError::Conflict { wait_time_ms, conflicting_locks }) => {
                self.events
                    .emit(Event::new(
                        id_generator::event_id(now_ms),
                        EventType::LockConflict,
                        session_id,
                        EventData::Lock { lock_id: String::new(), client_id: client_id.to_string(), wait_time_ms: Some(wait_time_ms) },
                        to_utc(now_ms),
                    ))
                    .await;
                Err(CoreError::Conflict(format!(
                    "wait {wait_time_ms}ms, {} conflicting lock(s)",
                    conflicting_locks.len()
                )))
            }
            Err(e) => Err(CoreError::from(e)),
        }
    }

    pub async fn release_lock(&self, session_id: &str, lock_id: &str, now_ms: i64) -> CoreResult<()> {
        let releasing_client = self
            .locks
            .active_locks(session_id, now_ms)
            .into_iter()
            .find(|l| l.lock_id == lock_id)
            .map(|l| l.client_id)
            .unwrap_or_default();
        let granted = self.locks.release(session_id, lock_id, now_ms)?;
        self.events
            .emit(Event::new(
                id_generator::event_id(now_ms),
                EventType::LockReleased,
                session_id,
                EventData::Lock { lock_id: lock_id.to_string(), client_id: releasing_client, wait_time_ms: None },
                to_utc(now_ms),
            ))
            .await;
        for lock in granted {
            self.events
                .emit(Event::new(
                    id_generator::event_id(now_ms),
                    EventType::LockAcquired,
                    session_id,
                    EventData::Lock { lock_id: lock.lock_id, client_id: lock.client_id, wait_time_ms: None },
                    to_utc(now_ms),
                ))
                .await;
        }
        Ok(())
    }

    pub fn force_release_session_locks(&self, session_id: &str) {
        self.locks.force_release(session_id);
    }

    pub fn active_locks(&self, session_id: &str, now_ms: i64) -> Vec<Lock> {
        self.locks.active_locks(session_id, now_ms)
    }

    /// Periodic maintenance (intended to run every 60s from an external
    /// driver — this crate has no implicit event loop, §9): sweeps expired
    /// locks and evicts idle clients.
    pub fn run_cleanup_sweep(&self, now_ms: i64) {
        self.locks.sweep_expired(now_ms);
        for client_id in self.clients.idle_clients(now_ms, self.config.client_timeout_ms) {
            let _ = self.clients.unregister(&client_id, &self.locks, now_ms);
        }
    }

    /// Acquires a step-execution lock for `client_id`, executes the next
    /// step, and releases the lock on every exit path via [`LockGuard`].
    pub async fn execute_next_step_with_lock(
        &self,
        session_id: &str,
        client_id: &str,
        exclusive: bool,
        now_ms: i64,
    ) -> CoreResult<ExecuteStepOutcome> {
        let access_level = self
            .clients
            .get(client_id)
            .map(|c| c.access_level)
            .ok_or_else(|| CoreError::NotFound(format!("client {client_id}")))?;

        let lock_type = if exclusive { LockType::Exclusive } else { LockType::Write };
        let request = AcquireRequest {
            session_id: session_id.to_string(),
            client_id: client_id.to_string(),
            lock_type,
            scope: LockScope::StepExecution,
            access_level,
            timeout_ms: self.config.lock_timeout_ms,
            reason: "execute_next_step_with_lock".to_string(),
        };
        let lock = self.locks.acquire(request, now_ms).map_err(CoreError::from)?;
        let _guard = LockGuard { manager: &self.locks, session_id: session_id.to_string(), lock_id: lock.lock_id.clone() };

        self.execute_next_step(session_id, now_ms).await
    }

    /// Applies `fields` from `client_id` to the session, detecting and
    /// resolving a three-way conflict against the most recent *other*
    /// client's unresolved write (C8). The first writer since the pending
    /// slot was last cleared is applied immediately ("first wins" in the
    /// race sense); the second writer drives full detection/resolution.
    pub async fn update_state_with_conflict_resolution(
        &self,
        session_id: &str,
        client_id: &str,
        fields: serde_json::Map<String, Value>,
        last_modified: i64,
        now_ms: i64,
    ) -> CoreResult<ConflictResolution> {
        let entry = self.get_active(session_id)?;

        let other = {
            let mut pending = self.pending_updates.lock();
            let other = pending.get(session_id).filter(|p| p.client_id != client_id).cloned();
            pending.insert(
                session_id.to_string(),
                PendingUpdate { client_id: client_id.to_string(), fields: fields.clone(), last_modified },
            );
            other
        };

        let Some(other) = other else {
            let mut guard = entry.lock().await;
            apply_fields(&mut guard.state, &fields);
            guard.state.last_modified = now_ms;
            guard.metadata.touch(now_ms);
            self.persist(&guard.state, &guard.metadata, now_ms).await?;
            return Ok(ConflictResolution {
                conflict_id: String::new(),
                strategy: ResolutionStrategy::Merge,
                resolved_state: Value::Object(fields),
                confidence: 1.0,
                requires_review: false,
            });
        };

        let base = {
            let guard = entry.lock().await;
            state_to_map(&guard.state)
        };

        let a = PartialUpdate { client_id: client_id.to_string(), fields: fields.clone(), last_modified: Some(last_modified) };
        let b = PartialUpdate { client_id: other.client_id.clone(), fields: other.fields.clone(), last_modified: Some(other.last_modified) };

        let detected = conflict::detect(session_id, &base, &a, &b, 0.3, now_ms)?;

        let resolution = match detected {
            None => {
                let mut guard = entry.lock().await;
                apply_fields(&mut guard.state, &fields);
                apply_fields(&mut guard.state, &other.fields);
                guard.state.last_modified = now_ms;
                guard.metadata.touch(now_ms);
                self.persist(&guard.state, &guard.metadata, now_ms).await?;
                ConflictResolution {
                    conflict_id: String::new(),
                    strategy: ResolutionStrategy::Merge,
                    resolved_state: Value::Object(fields),
                    confidence: 1.0,
                    requires_review: false,
                }
            }
            Some(record) => {
                // `conflict_resolution` names the preferred automatic strategy, not
                // whether resolution is automatic at all — §6 exposes no knob to
                // disable auto-resolution, so the §4.8 "if auto enabled" branches
                // are always reachable.
                let strategy = conflict::select_strategy(&record, true);
                let started = std::time::Instant::now();

                let resolution = match strategy {
                    ResolutionStrategy::Merge => merge::merge(&record, &a, &b),
                    ResolutionStrategy::TimestampBased => merge::timestamp_based(&record, &a, &b),
                    ResolutionStrategy::ClientPriority => {
                        let a_level = self.clients.get(client_id).map(|c| c.access_level).unwrap_or(AccessLevel::Read);
                        let b_level = self.clients.get(&other.client_id).map(|c| c.access_level).unwrap_or(AccessLevel::Read);
                        merge::client_priority(&record, a_level, b_level)
                    }
                    ResolutionStrategy::Rollback => merge::rollback(&record),
                    ResolutionStrategy::ManualIntervention => merge::manual_intervention(&record),
                };

                self.conflict_stats.record(
                    record.conflict_type,
                    strategy,
                    started.elapsed().as_millis() as u64,
                    resolution.confidence > 0.0,
                );

                if let Value::Object(resolved_fields) = &resolution.resolved_state {
                    let mut guard = entry.lock().await;
                    apply_fields(&mut guard.state, resolved_fields);
                    guard.state.last_modified = now_ms;
                    guard.metadata.touch(now_ms);
                    self.persist(&guard.state, &guard.metadata, now_ms).await?;
                }

                self.events
                    .emit(Event::new(
                        id_generator::event_id(now_ms),
                        EventType::LockConflict,
                        session_id,
                        EventData::Conflict { conflict_id: record.conflict_id.clone(), severity: format!("{:?}", record.severity).to_lowercase() },
                        to_utc(now_ms),
                    ))
                    .await;

                resolution
            }
        };

        self.pending_updates.lock().remove(session_id);
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Complexity, StrategyType};

    fn problem(complexity: Complexity) -> Problem {
        Problem {
            description: "find the shortest proof".to_string(),
            goal_state: "QED".to_string(),
            complexity,
            constraints: vec![],
            context: serde_json::Map::new(),
            domain: "mathematics".to_string(),
        }
    }

    fn strategy() -> Strategy {
        Strategy { name: StrategyName::Incremental, strategy_type: StrategyType::Sequential, parameters: serde_json::Map::new() }
    }

    #[tokio::test]
    async fn execute_next_step_advances_and_completes() {
        let manager = ChainManager::new_in_memory(SessionManagerConfig::default());
        let steps = vec![Step::new("s0", 0, "first"), Step::new("s1", 1, "second")];
        let state = manager.create_state(problem(Complexity::Simple), steps, strategy(), 0).await.unwrap();

        let first = manager.execute_next_step(&state.id, 10).await.unwrap();
        assert!(first.ok);
        assert_eq!(first.updated_state.unwrap().current_step, 1);

        let second = manager.execute_next_step(&state.id, 20).await.unwrap();
        assert!(second.ok);
        let final_state = second.updated_state.unwrap();
        assert_eq!(final_state.current_step, 2);

        let idle = manager.execute_next_step(&state.id, 30).await.unwrap();
        assert!(idle.ok);
    }

    #[tokio::test]
    async fn execute_next_step_blocks_on_unsatisfied_dependency() {
        let manager = ChainManager::new_in_memory(SessionManagerConfig::default());
        let steps = vec![
            Step::new("s0", 0, "first"),
            Step::new("s1", 1, "second").with_dependencies(["s0".to_string()]),
        ];
        let mut state = manager.create_state(problem(Complexity::Simple), steps, strategy(), 0).await.unwrap();
        // Simulate a state where the prefix accounting has advanced past s0
        // while s0 itself never actually completed (e.g. after a partial
        // resume): execute_next_step must still refuse to run s1.
        state.current_step = 1;
        {
            let entry = manager.get_active(&state.id).unwrap();
            entry.lock().await.state.current_step = 1;
        }

        let outcome = manager.execute_next_step(&state.id, 10).await.unwrap();
        assert!(!outcome.ok);
        assert!(outcome.error.unwrap().contains("s0"));
    }

    #[tokio::test]
    async fn save_and_load_round_trips_through_blob_store() {
        let manager = ChainManager::new_in_memory(SessionManagerConfig::default());
        let steps = vec![Step::new("s0", 0, "first")];
        let state = manager.create_state(problem(Complexity::Simple), steps, strategy(), 0).await.unwrap();
        manager.save(&state.id, false, 5).await.unwrap();

        manager.active.write().remove(&state.id);
        let reloaded = manager.load(&state.id, 10).await.unwrap();
        assert_eq!(reloaded.id, state.id);
    }

    #[tokio::test]
    async fn remove_requires_terminal_status() {
        let manager = ChainManager::new_in_memory(SessionManagerConfig::default());
        let state = manager.create_state(problem(Complexity::Simple), vec![], strategy(), 0).await.unwrap();
        let err = manager.remove(&state.id, SessionStatus::Active, 0).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        manager.remove(&state.id, SessionStatus::Completed, 0).await.unwrap();
    }

    #[tokio::test]
    async fn second_writer_triggers_conflict_resolution() {
        let manager = ChainManager::new_in_memory(SessionManagerConfig::default());
        let state = manager.create_state(problem(Complexity::Simple), vec![], strategy(), 0).await.unwrap();
        manager
            .register_client("alice", &state.id, Default::default(), AccessLevel::Write, 0)
            .await
            .unwrap();
        manager
            .register_client("bob", &state.id, Default::default(), AccessLevel::Write, 0)
            .await
            .unwrap();

        let mut fields_a = serde_json::Map::new();
        fields_a.insert("tags".to_string(), serde_json::json!(["x", "y"]));
        manager
            .update_state_with_conflict_resolution(&state.id, "alice", fields_a, 10, 10)
            .await
            .unwrap();

        let mut fields_b = serde_json::Map::new();
        fields_b.insert("tags".to_string(), serde_json::json!(["x", "z"]));
        let resolution = manager
            .update_state_with_conflict_resolution(&state.id, "bob", fields_b, 11, 11)
            .await
            .unwrap();

        assert_eq!(resolution.strategy, ResolutionStrategy::Merge);
        let reloaded = manager.load(&state.id, 12).await.unwrap();
        let tags = reloaded.problem.context.get("tags").unwrap().as_array().unwrap();
        assert_eq!(tags.len(), 3);
    }

    #[tokio::test]
    async fn lock_conflict_surfaces_as_core_error() {
        let manager = ChainManager::new_in_memory(SessionManagerConfig::default());
        let state = manager.create_state(problem(Complexity::Simple), vec![], strategy(), 0).await.unwrap();
        manager
            .register_client("alice", &state.id, Default::default(), AccessLevel::Admin, 0)
            .await
            .unwrap();
        manager
            .register_client("bob", &state.id, Default::default(), AccessLevel::Admin, 0)
            .await
            .unwrap();

        manager
            .acquire_lock(&state.id, "alice", LockType::Exclusive, LockScope::FullSession, "test", 0)
            .await
            .unwrap();
        let err = manager
            .acquire_lock(&state.id, "bob", LockType::Exclusive, LockScope::FullSession, "test", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }
}
