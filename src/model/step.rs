//! A single node in a reasoning chain.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Lifecycle of a [`Step`] within a [`crate::model::ReasoningState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped)
    }
}

/// A node in the reasoning chain. `index` must equal the step's position in
/// `ReasoningState::steps` (invariant I2/P2); dependencies must reference
/// earlier indices (I5) and contain no cycles (I4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub index: usize,
    pub description: String,
    pub reasoning: String,
    pub status: StepStatus,
    #[serde(default)]
    pub inputs: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub outputs: serde_json::Map<String, serde_json::Value>,
    /// Step ids this step depends on. All must refer to earlier steps (I5).
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    pub confidence: f64,
    pub timestamp: i64,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl Step {
    #[must_use]
    pub fn new(id: impl Into<String>, index: usize, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            index,
            description: description.into(),
            reasoning: String::new(),
            status: StepStatus::Pending,
            inputs: serde_json::Map::new(),
            outputs: serde_json::Map::new(),
            dependencies: BTreeSet::new(),
            confidence: 0.0,
            timestamp: 0,
            duration_ms: None,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = String>) -> Self {
        self.dependencies = deps.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn is_dependency_satisfied_by(&self, completed: &BTreeSet<String>) -> bool {
        self.dependencies.iter().all(|d| completed.contains(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fresh step starts pending with no dependencies.
    #[test]
    fn new_step_is_pending() {
        let step = Step::new("s0", 0, "do the thing");
        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.dependencies.is_empty());
    }

    #[test]
    fn dependency_satisfaction() {
        let step = Step::new("s1", 1, "second").with_dependencies(["s0".to_string()]);
        let empty: BTreeSet<String> = BTreeSet::new();
        assert!(!step.is_dependency_satisfied_by(&empty));
        let mut done = BTreeSet::new();
        done.insert("s0".to_string());
        assert!(step.is_dependency_satisfied_by(&done));
    }
}
