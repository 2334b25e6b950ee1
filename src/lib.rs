//! # reasoning-sessions: multi-client session manager for reasoning chains
//!
//! This crate owns an in-memory collection of *reasoning states* — the
//! structured representation of a problem-solving chain — and lets several
//! clients read and mutate the same session concurrently under a locking
//! discipline, detects and resolves write-write conflicts, persists state
//! with validation and checkpointed recovery, and progressively restores
//! sessions on startup.
//!
//! ## Core concepts
//!
//! - **[`model::ReasoningState`]**: the managed object — a problem, a
//!   strategy, and an ordered sequence of [`model::Step`]s.
//! - **[`chain_manager::ChainManager`]**: the orchestrator. Every external
//!   caller talks to this one type; it composes every other module behind a
//!   single API.
//! - **[`locks`]**: session-scoped multi-reader/single-writer/exclusive
//!   locks with a FIFO wait queue and TTL-based expiry.
//! - **[`conflict`]**: three-way conflict detection and resolution between
//!   two clients' concurrent partial updates.
//! - **[`validation`]**: a six-pass structural/consistency pipeline that
//!   scores a session's health and can auto-repair common defects.
//! - **[`recovery`]**: a priority-ordered strategy ladder for sessions that
//!   cannot be loaded cleanly.
//! - **[`restoration`]**: prioritized, staged restoration of sessions at
//!   startup.
//! - **[`event_bus`]**: typed lifecycle events, priority-ordered
//!   subscribers, bounded history.
//!
//! ## Quick start
//!
//! ```
//! use reasoning_sessions::chain_manager::ChainManager;
//! use reasoning_sessions::config::SessionManagerConfig;
//! use reasoning_sessions::model::{Complexity, Problem, Step, Strategy, StrategyName, StrategyType};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let manager = ChainManager::new_in_memory(SessionManagerConfig::default());
//!
//! let problem = Problem {
//!     description: "Find the shortest proof".to_string(),
//!     goal_state: "QED".to_string(),
//!     complexity: Complexity::Simple,
//!     constraints: vec![],
//!     context: serde_json::Map::new(),
//!     domain: "mathematics".to_string(),
//! };
//! let strategy = Strategy {
//!     name: StrategyName::Incremental,
//!     strategy_type: StrategyType::Sequential,
//!     parameters: serde_json::Map::new(),
//! };
//! let steps = vec![Step::new("s0", 0, "state the lemma")];
//!
//! let state = manager.create_state(problem, steps, strategy, 0).await.unwrap();
//! let outcome = manager.execute_next_step(&state.id, 10).await.unwrap();
//! assert!(outcome.ok);
//! # }
//! ```
//!
//! ## Module guide
//!
//! - [`model`] — the shared data model (state, steps, checkpoints, locks, …)
//! - [`blob_store`] — byte-level storage capability (C1)
//! - [`codec`] — versioned serialization and schema migration (C2)
//! - [`validation`] — structural/dependency validation and repair (C3)
//! - [`checkpoints`] — write-ahead checkpoints with bounded retention (C4)
//! - [`recovery`] — the recovery strategy ladder (C5)
//! - [`locks`] — the lock manager (C6)
//! - [`clients`] — client connection registry (C7)
//! - [`conflict`] — conflict detection and resolution (C8)
//! - [`event_bus`] — typed lifecycle events (C9)
//! - [`chain_manager`] — the orchestrator (C10)
//! - [`restoration`] — startup restoration planning (C11)
//! - [`step_executor`] — the pluggable step-execution capability
//! - [`config`] — the configuration surface
//! - [`error`] — the crate-wide error taxonomy
//! - [`telemetry`] — process-wide tracing initialization for binaries/tests
//! - [`utils`] — small helpers (id generation) shared across components

pub mod blob_store;
pub mod chain_manager;
pub mod checkpoints;
pub mod clients;
pub mod codec;
pub mod config;
pub mod conflict;
pub mod error;
pub mod event_bus;
pub mod locks;
pub mod model;
pub mod recovery;
pub mod restoration;
pub mod step_executor;
pub mod telemetry;
pub mod utils;
pub mod validation;
