//! C5: priority-ordered strategy ladder for recovering a session that
//! cannot be loaded cleanly.
//!
//! The ordered-registration shape is grounded on the teacher's
//! `reducers::ReducerRegistry`; retry/backoff is grounded on the runner's
//! task-retry idiom.

pub mod strategies;

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::blob_store::BlobStore;
use crate::model::ReasoningState;

pub use strategies::{RecoveryContext, RecoveryStrategy, RecoveryType};

#[derive(Debug, Error, Diagnostic)]
pub enum RecoveryError {
    #[error("recovery attempt timed out after {0}ms")]
    #[diagnostic(code(reasoning_sessions::recovery::timeout))]
    Timeout(u64),

    #[error("no recovery strategy could handle this session: {0}")]
    #[diagnostic(code(reasoning_sessions::recovery::exhausted))]
    Exhausted(String),
}

pub type Result<T> = std::result::Result<T, RecoveryError>;

#[derive(Debug, Clone)]
pub struct RecoveryResult {
    pub ok: bool,
    pub state: Option<ReasoningState>,
    pub confidence: f64,
    pub issues: Vec<String>,
    pub strategy_name: String,
    pub recovery_type: RecoveryType,
    pub time_ms: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct RecoveryOptions {
    pub max_retry_attempts: u32,
    pub timeout_ms: u64,
    pub retry_delay_ms: u64,
    pub backoff_multiplier: u32,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            timeout_ms: 5000,
            retry_delay_ms: 1000,
            backoff_multiplier: 2,
        }
    }
}

/// Tracks per-strategy success rate as an exponential moving average
/// (alpha=0.2), used only for monitoring, never for strategy selection.
#[derive(Debug, Default)]
pub struct SuccessRateTracker {
    rates: rustc_hash::FxHashMap<String, f64>,
}

impl SuccessRateTracker {
    const ALPHA: f64 = 0.2;

    pub fn record(&mut self, strategy_name: &str, succeeded: bool) {
        let sample = if succeeded { 1.0 } else { 0.0 };
        let entry = self.rates.entry(strategy_name.to_string()).or_insert(sample);
        *entry = Self::ALPHA * sample + (1.0 - Self::ALPHA) * *entry;
    }

    pub fn rate(&self, strategy_name: &str) -> Option<f64> {
        self.rates.get(strategy_name).copied()
    }
}

/// The ladder: highest priority first. `full` (100) -> `checkpoint_rollback`
/// (80) -> `partial_reconstruction` (60) -> `minimal` (20, always handles).
pub fn default_ladder() -> Vec<Box<dyn RecoveryStrategy>> {
    vec![
        Box::new(strategies::FullReload),
        Box::new(strategies::CheckpointRollback),
        Box::new(strategies::PartialReconstruction),
        Box::new(strategies::Minimal),
    ]
}

/// Runs the ladder in priority order, trying each strategy that
/// `can_handle`s the context, retrying with exponential backoff up to
/// `options.max_retry_attempts`, bounded per attempt by `options.timeout_ms`.
#[instrument(skip(ladder, blob_store, tracker), fields(session_id = %ctx.session_id))]
pub async fn recover(
    ladder: &[Box<dyn RecoveryStrategy>],
    ctx: &RecoveryContext,
    blob_store: &dyn BlobStore,
    options: RecoveryOptions,
    tracker: &mut SuccessRateTracker,
) -> Result<RecoveryResult> {
    for strategy in ladder {
        if !strategy.can_handle(ctx) {
            continue;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = std::time::Instant::now();
            let outcome = tokio::time::timeout(
                Duration::from_millis(options.timeout_ms),
                strategy.execute(ctx, blob_store),
            )
            .await;

            match outcome {
                Ok(mut result) => {
                    result.time_ms = started.elapsed().as_millis() as u64;
                    tracker.record(&result.strategy_name, result.ok);
                    if result.ok {
                        info!(strategy = %result.strategy_name, attempt, "recovery strategy succeeded");
                        return Ok(result);
                    }
                    warn!(strategy = %result.strategy_name, attempt, "recovery strategy reported failure");
                    break;
                }
                Err(_elapsed) => {
                    tracker.record(strategy.name(), false);
                    if attempt >= options.max_retry_attempts {
                        return Err(RecoveryError::Timeout(options.timeout_ms));
                    }
                    let backoff = options.retry_delay_ms
                        * options.backoff_multiplier.pow(attempt.saturating_sub(1)) as u64;
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
            }

            if attempt >= options.max_retry_attempts {
                break;
            }
        }
    }

    Err(RecoveryError::Exhausted(ctx.session_id.clone()))
}
