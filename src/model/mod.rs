//! Data model shared across every component: the entities named in the
//! reasoning-session domain (state, steps, checkpoints, metadata, clients,
//! locks, conflicts). Field conventions follow explicit structs with
//! `#[must_use]` builders rather than dynamically-typed maps, per the
//! boundary-typing guidance for dynamic payloads.

pub mod checkpoint;
pub mod client;
pub mod conflict;
pub mod lock;
pub mod metadata;
pub mod reasoning_state;
pub mod step;

pub use checkpoint::{Checkpoint, CheckpointSnapshot};
pub use client::{AccessLevel, ClientSession};
pub use conflict::{Conflict, ConflictResolution, ConflictSeverity, ConflictType, ResolutionStrategy};
pub use lock::{Lock, LockRequest, LockScope, LockType};
pub use metadata::{SessionMetadata, SessionStatus, TimeoutConfig};
pub use reasoning_state::{
    Complexity, Problem, ReasoningState, ReasoningStateBuilder, Strategy, StrategyName, StrategyType,
};
pub use step::{Step, StepStatus};
