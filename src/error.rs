//! Crate-wide error taxonomy.
//!
//! [`CoreError`] is the public error surface returned by [`crate::chain_manager::ChainManager`]
//! and aggregates every component-local error type via `#[from]`, the same
//! way the teacher's runner aggregates checkpointer/scheduler errors.

use miette::Diagnostic;
use thiserror::Error;

use crate::blob_store::BlobStoreError;
use crate::checkpoints::CheckpointError;
use crate::clients::ClientRegistryError;
use crate::codec::CodecError;
use crate::conflict::ConflictError;
use crate::locks::LockError;
use crate::recovery::RecoveryError;
use crate::restoration::RestorationError;
use crate::validation::ValidationError;

/// The abstract error kinds named in the error-handling design: validation,
/// lookup, capacity, permission, and infrastructure failures.
#[derive(Debug, Error, Diagnostic)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    #[diagnostic(code(reasoning_sessions::invalid_input))]
    InvalidInput(String),

    #[error("not found: {0}")]
    #[diagnostic(code(reasoning_sessions::not_found))]
    NotFound(String),

    #[error("lock conflict: {0}")]
    #[diagnostic(code(reasoning_sessions::conflict))]
    Conflict(String),

    #[error("capacity exceeded: {0}")]
    #[diagnostic(code(reasoning_sessions::capacity_exceeded))]
    CapacityExceeded(String),

    #[error("permission denied: {0}")]
    #[diagnostic(code(reasoning_sessions::permission_denied))]
    PermissionDenied(String),

    #[error("corrupt state: {0}")]
    #[diagnostic(code(reasoning_sessions::corrupt))]
    Corrupt(String),

    #[error("unsupported schema version: {0}")]
    #[diagnostic(code(reasoning_sessions::unsupported_version))]
    UnsupportedVersion(String),

    #[error("operation timed out after {0}ms")]
    #[diagnostic(code(reasoning_sessions::timeout))]
    Timeout(u64),

    #[error("blob store I/O error: {0}")]
    #[diagnostic(code(reasoning_sessions::io_error))]
    IoError(String),

    #[error("internal invariant violation: {0}")]
    #[diagnostic(
        code(reasoning_sessions::internal),
        help("This should be unreachable; please file a bug report.")
    )]
    Internal(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

impl From<BlobStoreError> for CoreError {
    fn from(e: BlobStoreError) -> Self {
        match e {
            BlobStoreError::NotFound(key) => CoreError::NotFound(format!("blob key {key}")),
            BlobStoreError::Io(msg) => CoreError::IoError(msg),
        }
    }
}

impl From<CodecError> for CoreError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Corrupt(msg) => CoreError::Corrupt(msg),
            CodecError::UnsupportedVersion(v) => CoreError::UnsupportedVersion(v),
        }
    }
}

impl From<ValidationError> for CoreError {
    fn from(e: ValidationError) -> Self {
        CoreError::InvalidInput(e.to_string())
    }
}

impl From<CheckpointError> for CoreError {
    fn from(e: CheckpointError) -> Self {
        match e {
            CheckpointError::NotFound(msg) => CoreError::NotFound(msg),
            CheckpointError::Store(inner) => inner.into(),
        }
    }
}

impl From<LockError> for CoreError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::NotFound(msg) => CoreError::NotFound(msg),
            LockError::Conflict { .. } => CoreError::Conflict(e.to_string()),
            LockError::PermissionDenied(msg) => CoreError::PermissionDenied(msg),
        }
    }
}

impl From<ConflictError> for CoreError {
    fn from(e: ConflictError) -> Self {
        CoreError::Conflict(e.to_string())
    }
}

impl From<RecoveryError> for CoreError {
    fn from(e: RecoveryError) -> Self {
        match e {
            RecoveryError::Timeout(ms) => CoreError::Timeout(ms),
            RecoveryError::Exhausted(msg) => CoreError::Internal(msg),
        }
    }
}

impl From<RestorationError> for CoreError {
    fn from(e: RestorationError) -> Self {
        CoreError::Internal(e.to_string())
    }
}

impl From<ClientRegistryError> for CoreError {
    fn from(e: ClientRegistryError) -> Self {
        match e {
            ClientRegistryError::CapacityExceeded(msg) => CoreError::CapacityExceeded(msg),
            ClientRegistryError::NotFound(msg) => CoreError::NotFound(msg),
        }
    }
}
