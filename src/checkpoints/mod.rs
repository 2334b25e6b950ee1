//! C4: write-ahead checkpoints keyed by session, bounded retention.
//!
//! Grounded on the teacher's `runtimes::checkpointer` (`Checkpoint`,
//! `Checkpointer` trait, `InMemoryCheckpointer`), generalized with retention
//! trimming and restore-into-state semantics per §4.4.

pub mod store;

use miette::Diagnostic;
use thiserror::Error;

use crate::blob_store::BlobStoreError;
use crate::model::{Checkpoint, ReasoningState};

pub use store::{CheckpointStore, InMemoryCheckpointStore};

#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointError {
    #[error("checkpoint not found: {0}")]
    #[diagnostic(code(reasoning_sessions::checkpoints::not_found))]
    NotFound(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] BlobStoreError),
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Rebuilds `current_step` and `steps` from a checkpoint's snapshot. All
/// in-memory steps at or after the snapshot are replaced wholesale;
/// invariants I1-I5 are preserved because the snapshot was itself valid at
/// capture time.
pub fn restore_from_checkpoint(state: &mut ReasoningState, checkpoint: &Checkpoint) {
    state.current_step = checkpoint.snapshot.current_step;
    state.steps = checkpoint.snapshot.steps.clone();
}
