//! The four rungs of the recovery ladder (§4.5).

use async_trait::async_trait;

use crate::blob_store::BlobStore;
use crate::codec;
use crate::model::{Checkpoint, ReasoningState, ReasoningStateBuilder};
use crate::validation;

use super::RecoveryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryType {
    Full,
    Partial,
    CheckpointRollback,
    Reconstructed,
    Minimal,
}

/// Everything a strategy needs to decide whether it applies and to act.
#[derive(Debug, Clone)]
pub struct RecoveryContext {
    pub session_id: String,
    pub state_blob_key: String,
    pub metadata_present: bool,
    pub checkpoints: Vec<Checkpoint>,
    pub last_known_state: Option<ReasoningState>,
    pub now_ms: i64,
}

#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    fn priority(&self) -> u32;
    fn name(&self) -> &'static str;
    fn can_handle(&self, ctx: &RecoveryContext) -> bool;
    async fn execute(&self, ctx: &RecoveryContext, blob_store: &dyn BlobStore) -> RecoveryResult;
}

fn ok_result(
    strategy_name: &'static str,
    recovery_type: RecoveryType,
    state: ReasoningState,
    confidence: f64,
    issues: Vec<String>,
) -> RecoveryResult {
    RecoveryResult {
        ok: true,
        state: Some(state),
        confidence,
        issues,
        strategy_name: strategy_name.to_string(),
        recovery_type,
        time_ms: 0,
    }
}

fn fail_result(strategy_name: &'static str, recovery_type: RecoveryType, issue: String) -> RecoveryResult {
    RecoveryResult {
        ok: false,
        state: None,
        confidence: 0.0,
        issues: vec![issue],
        strategy_name: strategy_name.to_string(),
        recovery_type,
        time_ms: 0,
    }
}

/// Priority 100: reload the latest blob and revalidate.
pub struct FullReload;

#[async_trait]
impl RecoveryStrategy for FullReload {
    fn priority(&self) -> u32 {
        100
    }

    fn name(&self) -> &'static str {
        "full"
    }

    fn can_handle(&self, ctx: &RecoveryContext) -> bool {
        ctx.metadata_present
    }

    async fn execute(&self, ctx: &RecoveryContext, blob_store: &dyn BlobStore) -> RecoveryResult {
        let bytes = match blob_store.get(&ctx.state_blob_key).await {
            Ok(b) => b,
            Err(e) => return fail_result(self.name(), RecoveryType::Full, e.to_string()),
        };
        let state = match codec::decode(&bytes, ctx.now_ms) {
            Ok(s) => s,
            Err(e) => return fail_result(self.name(), RecoveryType::Full, e.to_string()),
        };
        let report = validation::validate(&state);
        if matches!(report.status, validation::HealthStatus::Corrupted) {
            return fail_result(self.name(), RecoveryType::Full, "revalidation failed".to_string());
        }
        ok_result(self.name(), RecoveryType::Full, state, 0.95, vec![])
    }
}

/// Priority 80: rebuild from the newest valid checkpoint; steps older than
/// the checkpoint boundary are lost, confidence scaled by coverage.
pub struct CheckpointRollback;

#[async_trait]
impl RecoveryStrategy for CheckpointRollback {
    fn priority(&self) -> u32 {
        80
    }

    fn name(&self) -> &'static str {
        "checkpoint_rollback"
    }

    fn can_handle(&self, ctx: &RecoveryContext) -> bool {
        !ctx.checkpoints.is_empty()
    }

    async fn execute(&self, ctx: &RecoveryContext, _blob_store: &dyn BlobStore) -> RecoveryResult {
        let Some(checkpoint) = ctx.checkpoints.iter().max_by_key(|c| c.timestamp) else {
            return fail_result(self.name(), RecoveryType::CheckpointRollback, "no checkpoints".into());
        };

        let base = ctx
            .last_known_state
            .clone()
            .unwrap_or_else(|| ReasoningStateBuilder::new(ctx.now_ms).with_id(ctx.session_id.clone()).build());

        let mut state = base;
        crate::checkpoints::restore_from_checkpoint(&mut state, checkpoint);

        let coverage = if state.total_steps() == 0 {
            0.0
        } else {
            (checkpoint.snapshot.steps.len() as f64 / state.total_steps().max(1) as f64).min(1.0)
        };
        let confidence = (0.9 * coverage).min(0.9);

        ok_result(
            self.name(),
            RecoveryType::CheckpointRollback,
            state,
            confidence,
            vec![format!("restored from checkpoint {}", checkpoint.id)],
        )
    }
}

/// Priority 60: reindex, regenerate missing ids, clamp bounds on the last
/// known state. Confidence scales inversely with the number of repairs applied.
pub struct PartialReconstruction;

#[async_trait]
impl RecoveryStrategy for PartialReconstruction {
    fn priority(&self) -> u32 {
        60
    }

    fn name(&self) -> &'static str {
        "partial_reconstruction"
    }

    fn can_handle(&self, ctx: &RecoveryContext) -> bool {
        ctx.last_known_state.is_some()
    }

    async fn execute(&self, ctx: &RecoveryContext, _blob_store: &dyn BlobStore) -> RecoveryResult {
        let Some(last_known) = ctx.last_known_state.clone() else {
            return fail_result(self.name(), RecoveryType::Partial, "no last-known state".into());
        };
        let (repaired, report) = validation::validate_and_repair(&last_known);
        let repairs = report.repaired_issue_count();
        // 0.95 with no repairs needed, descending toward 0.5 as repairs pile up.
        let confidence = (0.95 - 0.05 * repairs as f64).clamp(0.5, 0.95);
        ok_result(
            self.name(),
            RecoveryType::Partial,
            repaired,
            confidence,
            report.issues.into_iter().map(|i| i.code).collect(),
        )
    }
}

/// Priority 20: always handles. Produces a well-formed one-step placeholder
/// with the session id preserved.
pub struct Minimal;

#[async_trait]
impl RecoveryStrategy for Minimal {
    fn priority(&self) -> u32 {
        20
    }

    fn name(&self) -> &'static str {
        "minimal"
    }

    fn can_handle(&self, _ctx: &RecoveryContext) -> bool {
        true
    }

    async fn execute(&self, ctx: &RecoveryContext, _blob_store: &dyn BlobStore) -> RecoveryResult {
        use crate::model::Step;

        let placeholder = Step::new("placeholder-0", 0, "Recovered placeholder step");
        let state = ReasoningStateBuilder::new(ctx.now_ms)
            .with_id(ctx.session_id.clone())
            .with_steps(vec![placeholder])
            .build();
        ok_result(
            self.name(),
            RecoveryType::Minimal,
            state,
            0.3,
            vec!["produced minimal placeholder state".to_string()],
        )
    }
}
