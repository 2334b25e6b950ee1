//! Write-write conflict records produced and resolved by [`crate::conflict`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    ConcurrentModification,
    StepOverlap,
    StateDivergence,
    LockViolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    Merge,
    TimestampBased,
    ClientPriority,
    Rollback,
    ManualIntervention,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub conflict_id: String,
    pub session_id: String,
    pub client_a: String,
    pub client_b: String,
    pub state_a: serde_json::Value,
    pub state_b: serde_json::Value,
    pub base_state: serde_json::Value,
    pub affected_fields: Vec<String>,
    pub severity: ConflictSeverity,
    pub detected_at: i64,
    pub conflict_type: ConflictType,
}

/// Outcome of resolving a [`Conflict`] via a [`ResolutionStrategy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub conflict_id: String,
    pub strategy: ResolutionStrategy,
    pub resolved_state: serde_json::Value,
    pub confidence: f64,
    pub requires_review: bool,
}
