//! Immutable snapshots of `(currentStep, steps)` used for rollback recovery.

use serde::{Deserialize, Serialize};

use crate::model::step::Step;

/// A deep-copied snapshot of the chain's progress at a point in time.
///
/// Checkpoints never share references with the live `ReasoningState` they
/// were taken from; `steps` is a full clone of the slice at capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub timestamp: i64,
    pub step_index: usize,
    pub snapshot: CheckpointSnapshot,
    pub label: String,
    pub auto: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSnapshot {
    pub current_step: usize,
    pub steps: Vec<Step>,
}

impl Checkpoint {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        timestamp: i64,
        current_step: usize,
        steps: &[Step],
        label: impl Into<String>,
        auto: bool,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            step_index: current_step,
            snapshot: CheckpointSnapshot {
                current_step,
                steps: steps.to_vec(),
            },
            label: label.into(),
            auto,
        }
    }
}
