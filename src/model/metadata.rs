//! Persisted sidecar metadata for a session, independent of the full state blob.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Archived,
    Failed,
}

/// Timeout configuration driving `SessionMetadata::expires_at` (I6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub active_timeout_ms: i64,
    pub paused_timeout_ms: i64,
    pub completed_timeout_ms: i64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            active_timeout_ms: 24 * 60 * 60 * 1000,
            paused_timeout_ms: 7 * 24 * 60 * 60 * 1000,
            completed_timeout_ms: 30 * 24 * 60 * 60 * 1000,
        }
    }
}

impl TimeoutConfig {
    /// Timeout in ms applicable to `status`. Archived/failed sessions never expire
    /// on their own; they are removed explicitly.
    pub fn timeout_for(&self, status: SessionStatus) -> i64 {
        match status {
            SessionStatus::Active => self.active_timeout_ms,
            SessionStatus::Paused => self.paused_timeout_ms,
            SessionStatus::Completed => self.completed_timeout_ms,
            SessionStatus::Archived | SessionStatus::Failed => i64::MAX,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub id: String,
    pub created_at: i64,
    pub last_modified: i64,
    pub last_activity: i64,
    pub status: SessionStatus,
    pub problem_summary: String,
    pub strategy_name: String,
    pub total_steps: usize,
    pub current_step: usize,
    pub checkpoint_count: usize,
    pub schema_version: String,
    pub timeout_config: TimeoutConfig,
    /// Derived: `last_activity + timeout(status)` (I6). Recomputed on every touch.
    pub expires_at: i64,
}

impl SessionMetadata {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        now: i64,
        problem_summary: impl Into<String>,
        strategy_name: impl Into<String>,
        total_steps: usize,
        timeout_config: TimeoutConfig,
    ) -> Self {
        let status = SessionStatus::Active;
        let expires_at = now + timeout_config.timeout_for(status);
        Self {
            id: id.into(),
            created_at: now,
            last_modified: now,
            last_activity: now,
            status,
            problem_summary: problem_summary.into(),
            strategy_name: strategy_name.into(),
            total_steps,
            current_step: 0,
            checkpoint_count: 0,
            schema_version: "3.0.0".to_string(),
            timeout_config,
            expires_at,
        }
    }

    /// Recomputes `expires_at` from `last_activity` and the current status (I6).
    pub fn recompute_expiry(&mut self) {
        self.expires_at = self.last_activity + self.timeout_config.timeout_for(self.status);
    }

    pub fn touch(&mut self, now: i64) {
        self.last_activity = now;
        self.recompute_expiry();
    }

    pub fn set_status(&mut self, status: SessionStatus, now: i64) {
        self.status = status;
        self.last_modified = now;
        self.recompute_expiry();
    }
}
