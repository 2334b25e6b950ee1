//! The configuration surface (§6): every value optional, defaults shown
//! below. Overridable from the environment via `dotenvy`, the same loading
//! pattern the teacher's `runtime_config` uses for its sqlite db name.

#[derive(Clone, Debug, PartialEq)]
pub enum LockGranularity {
    Session,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConflictResolutionMode {
    FirstWins,
    Merge,
    TimestampBased,
}

#[derive(Clone, Debug)]
pub struct SessionManagerConfig {
    pub max_clients_per_session: usize,
    pub lock_timeout_ms: i64,
    pub client_timeout_ms: i64,
    pub enable_read_locks: bool,
    pub enable_write_locks: bool,
    pub enable_exclusive_locks: bool,
    pub lock_granularity: LockGranularity,
    pub conflict_resolution: ConflictResolutionMode,
    pub active_timeout_ms: i64,
    pub paused_timeout_ms: i64,
    pub completed_timeout_ms: i64,
    pub enable_auto_cleanup: bool,
    pub max_concurrent_restorations: usize,
    pub health_score_threshold: u8,
    pub max_retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub backoff_multiplier: u32,
    pub handler_timeout_ms: u64,
    pub max_history_size: usize,
    pub checkpoint_retention: usize,
    /// Ambient addition (not in §6's table): bounds a single `StepExecutor`
    /// invocation inside `ChainManager::execute_next_step`.
    pub step_timeout_ms: u64,
    /// Ambient addition: bounds a single recovery-strategy attempt,
    /// distinct from `retry_delay_ms`/`backoff_multiplier` which govern the
    /// spacing between attempts.
    pub recovery_timeout_ms: u64,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            max_clients_per_session: 5,
            lock_timeout_ms: 30_000,
            client_timeout_ms: 300_000,
            enable_read_locks: true,
            enable_write_locks: true,
            enable_exclusive_locks: true,
            lock_granularity: LockGranularity::Session,
            conflict_resolution: ConflictResolutionMode::FirstWins,
            active_timeout_ms: 24 * 60 * 60 * 1000,
            paused_timeout_ms: 7 * 24 * 60 * 60 * 1000,
            completed_timeout_ms: 30 * 24 * 60 * 60 * 1000,
            enable_auto_cleanup: true,
            max_concurrent_restorations: 3,
            health_score_threshold: 40,
            max_retry_attempts: 3,
            retry_delay_ms: 1000,
            backoff_multiplier: 2,
            handler_timeout_ms: 5000,
            max_history_size: 1000,
            checkpoint_retention: 10,
            step_timeout_ms: 30_000,
            recovery_timeout_ms: 5_000,
        }
    }
}

impl SessionManagerConfig {
    /// Loads defaults, then overlays any `REASONING_SESSIONS_*` environment
    /// variables found via `dotenvy`. Unset or unparsable variables fall back
    /// to the default silently; this is a convenience layer, not validation.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut cfg = Self::default();
        if let Some(v) = env_usize("REASONING_SESSIONS_MAX_CLIENTS_PER_SESSION") {
            cfg.max_clients_per_session = v;
        }
        if let Some(v) = env_i64("REASONING_SESSIONS_LOCK_TIMEOUT_MS") {
            cfg.lock_timeout_ms = v;
        }
        if let Some(v) = env_i64("REASONING_SESSIONS_CLIENT_TIMEOUT_MS") {
            cfg.client_timeout_ms = v;
        }
        if let Some(v) = env_usize("REASONING_SESSIONS_MAX_CONCURRENT_RESTORATIONS") {
            cfg.max_concurrent_restorations = v;
        }
        if let Some(v) = env_usize("REASONING_SESSIONS_CHECKPOINT_RETENTION") {
            cfg.checkpoint_retention = v;
        }
        cfg
    }

    #[must_use]
    pub fn with_checkpoint_retention(mut self, retention: usize) -> Self {
        self.checkpoint_retention = retention;
        self
    }

    #[must_use]
    pub fn with_lock_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.parse().ok()
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok()?.parse().ok()
}
