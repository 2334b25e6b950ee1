//! External interface (§6): the domain-specific step-execution simulator is
//! out of scope for this crate and is modeled as a pluggable capability,
//! grounded on the teacher's `node::Node` trait (single async method,
//! `Send + Sync`, state-in/partial-out).

use async_trait::async_trait;

use crate::model::Step;

/// What a [`StepExecutor`] reports back for one attempted step.
#[derive(Debug, Clone, Default)]
pub struct StepExecutionOutcome {
    pub ok: bool,
    pub outputs: serde_json::Map<String, serde_json::Value>,
    pub errors: Vec<String>,
}

impl StepExecutionOutcome {
    #[must_use]
    pub fn success(outputs: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            ok: true,
            outputs,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            ok: false,
            outputs: serde_json::Map::new(),
            errors,
        }
    }
}

/// A pluggable simulator for executing one [`Step`] against a context
/// snapshot. The core awaits this and bounds it with a step timeout
/// ([`crate::config::SessionManagerConfig::step_timeout_ms`]); it never
/// inspects *how* a step produces its outputs.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(
        &self,
        step: &Step,
        context_snapshot: &serde_json::Map<String, serde_json::Value>,
    ) -> StepExecutionOutcome;
}

/// A trivial executor that marks every step as immediately completed with no
/// outputs. Useful for tests and for embedding a placeholder core until a
/// real domain executor is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStepExecutor;

#[async_trait]
impl StepExecutor for NoopStepExecutor {
    async fn execute(
        &self,
        _step: &Step,
        _context_snapshot: &serde_json::Map<String, serde_json::Value>,
    ) -> StepExecutionOutcome {
        StepExecutionOutcome::success(serde_json::Map::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Step;

    #[tokio::test]
    async fn noop_executor_always_succeeds() {
        let step = Step::new("s0", 0, "do the thing");
        let outcome = NoopStepExecutor.execute(&step, &serde_json::Map::new()).await;
        assert!(outcome.ok);
        assert!(outcome.errors.is_empty());
    }
}
