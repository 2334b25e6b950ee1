//! C1: byte-level CRUD on named keys with directory-like listing.
//!
//! `BlobStore` is the sole external collaborator that knows about bytes on
//! disk (or wherever); no component above C4 may assume a filesystem layout.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

#[derive(Debug, Error, Diagnostic)]
pub enum BlobStoreError {
    #[error("key not found: {0}")]
    #[diagnostic(code(reasoning_sessions::blob_store::not_found))]
    NotFound(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(reasoning_sessions::blob_store::io))]
    Io(String),
}

pub type Result<T> = std::result::Result<T, BlobStoreError>;

/// Byte-level storage capability. All operations are transactional at the
/// key level; directory semantics are synthesized from key prefixes.
/// Implementations must survive crashes between `put`s (discard partial
/// writes via temp+rename or an equivalent atomic replace) and must provide
/// read-after-write consistency on the same key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn delete(&self, key: &str) -> Result<()>;
    /// Lexicographically ordered keys under `prefix`.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>>;
    /// No-op for stores without real directories; must succeed idempotently.
    async fn ensure_prefix(&self, prefix: &str) -> Result<()>;
    /// Recursively copies every key under `src` to the corresponding key
    /// under `dst`, used by `ChainManager::save(.., backup=true)`.
    async fn copy_tree(&self, src: &str, dst: &str) -> Result<()>;
}
