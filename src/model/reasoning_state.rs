//! The managed object: a reasoning chain's problem, strategy, steps, and checkpoints.

use serde::{Deserialize, Serialize};

use crate::model::checkpoint::Checkpoint;
use crate::model::step::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    Expert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub description: String,
    pub goal_state: String,
    pub complexity: Complexity,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
    pub domain: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    TopDown,
    BottomUp,
    DivideConquer,
    Incremental,
    Parallel,
    Iterative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    Hierarchical,
    Sequential,
    Parallel,
    Adaptive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub name: StrategyName,
    pub strategy_type: StrategyType,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

/// The core managed object. Invariants I1-I3 (`totalSteps == |steps|`, step
/// indices match array position, `0 <= currentStep <= totalSteps`) must hold
/// for every value that escapes [`crate::validation`] or [`ReasoningState::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningState {
    pub id: String,
    pub created_at: i64,
    pub last_modified: i64,
    pub problem: Problem,
    pub strategy: Strategy,
    pub steps: Vec<Step>,
    pub current_step: usize,
    pub checkpoints: Vec<Checkpoint>,
}

impl ReasoningState {
    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    /// Trims `checkpoints` to the last `retention` entries (P5), discarding the oldest.
    pub fn trim_checkpoints(&mut self, retention: usize) {
        if self.checkpoints.len() > retention {
            let excess = self.checkpoints.len() - retention;
            self.checkpoints.drain(0..excess);
        }
    }

    pub fn latest_checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }
}

/// Fluent builder for constructing a [`ReasoningState`], mirroring the
/// `with_*` + `#[must_use]` convention used throughout this crate.
#[derive(Debug, Default)]
pub struct ReasoningStateBuilder {
    id: Option<String>,
    problem: Option<Problem>,
    strategy: Option<Strategy>,
    steps: Vec<Step>,
    now: i64,
}

impl ReasoningStateBuilder {
    #[must_use]
    pub fn new(now: i64) -> Self {
        Self {
            now,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_problem(mut self, problem: Problem) -> Self {
        self.problem = Some(problem);
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    /// Builds the state without validating it. Callers must run it through
    /// [`crate::validation::SessionValidator`] before it is trusted.
    pub fn build(self) -> ReasoningState {
        let id = self.id.unwrap_or_default();
        ReasoningState {
            id,
            created_at: self.now,
            last_modified: self.now,
            problem: self.problem.unwrap_or(Problem {
                description: String::new(),
                goal_state: String::new(),
                complexity: Complexity::Simple,
                constraints: Vec::new(),
                context: serde_json::Map::new(),
                domain: String::new(),
            }),
            strategy: self.strategy.unwrap_or(Strategy {
                name: StrategyName::Incremental,
                strategy_type: StrategyType::Sequential,
                parameters: serde_json::Map::new(),
            }),
            steps: self.steps,
            current_step: 0,
            checkpoints: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_empty_state() {
        let state = ReasoningStateBuilder::new(100)
            .with_id("reasoning-test")
            .build();
        assert_eq!(state.id, "reasoning-test");
        assert_eq!(state.total_steps(), 0);
        assert_eq!(state.current_step, 0);
    }

    #[test]
    fn trim_checkpoints_keeps_newest() {
        let mut state = ReasoningStateBuilder::new(0).build();
        for i in 0..15 {
            state.checkpoints.push(Checkpoint::new(
                format!("cp{i}"),
                i as i64,
                i as usize,
                &[],
                "auto",
                true,
            ));
        }
        state.trim_checkpoints(10);
        assert_eq!(state.checkpoints.len(), 10);
        assert_eq!(state.checkpoints.first().unwrap().id, "cp5");
        assert_eq!(state.checkpoints.last().unwrap().id, "cp14");
    }
}
