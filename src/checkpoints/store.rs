//! `CheckpointStore` trait and an in-memory implementation, generalizing the
//! teacher's `InMemoryCheckpointer` (`RwLock<FxHashMap<..>>`) to keep a
//! bounded, ordered history per session instead of only the latest entry.

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::model::Checkpoint;

use super::Result;

/// `append` persists and trims to the last `retention` entries; `latest` and
/// `list` never suspend longer than a lock acquisition (§5: core algorithmic
/// work must not suspend — implementations backed by a `BlobStore` should
/// persist asynchronously outside the critical section).
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn append(&self, session_id: &str, checkpoint: Checkpoint, retention: usize) -> Result<()>;
    async fn latest(&self, session_id: &str) -> Result<Option<Checkpoint>>;
    async fn list(&self, session_id: &str) -> Result<Vec<Checkpoint>>;
    async fn get(&self, session_id: &str, checkpoint_id: &str) -> Result<Option<Checkpoint>>;
    async fn remove_session(&self, session_id: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryCheckpointStore {
    by_session: RwLock<FxHashMap<String, Vec<Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn append(&self, session_id: &str, checkpoint: Checkpoint, retention: usize) -> Result<()> {
        let mut guard = self.by_session.write();
        let entries = guard.entry(session_id.to_string()).or_default();
        entries.push(checkpoint);
        // Checkpoint ids are ordered monotonically by timestamp (C4 contract).
        entries.sort_by_key(|c| c.timestamp);
        if entries.len() > retention {
            let excess = entries.len() - retention;
            entries.drain(0..excess);
        }
        Ok(())
    }

    async fn latest(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self
            .by_session
            .read()
            .get(session_id)
            .and_then(|v| v.last())
            .cloned())
    }

    async fn list(&self, session_id: &str) -> Result<Vec<Checkpoint>> {
        Ok(self
            .by_session
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get(&self, session_id: &str, checkpoint_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self
            .by_session
            .read()
            .get(session_id)
            .and_then(|v| v.iter().find(|c| c.id == checkpoint_id))
            .cloned())
    }

    async fn remove_session(&self, session_id: &str) -> Result<()> {
        self.by_session.write().remove(session_id);
        Ok(())
    }
}
