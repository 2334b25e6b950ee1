//! Volatile, in-process `BlobStore` for testing, grounded on the teacher's
//! `InMemoryCheckpointer` (an `RwLock<FxHashMap<..>>`).

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{BlobStoreError, Result};

#[derive(Default)]
pub struct MemoryBlobStore {
    entries: RwLock<FxHashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl super::BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.entries.write().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| BlobStoreError::NotFound(key.to_string()))
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ensure_prefix(&self, _prefix: &str) -> Result<()> {
        Ok(())
    }

    async fn copy_tree(&self, src: &str, dst: &str) -> Result<()> {
        let snapshot: Vec<(String, Vec<u8>)> = {
            let guard = self.entries.read();
            guard
                .iter()
                .filter(|(k, _)| k.starts_with(src))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        let mut guard = self.entries.write();
        for (key, bytes) in snapshot {
            let suffix = &key[src.len()..];
            guard.insert(format!("{dst}{suffix}"), bytes);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::BlobStore;
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryBlobStore::new();
        store.put("a/b", b"hello".to_vec()).await.unwrap();
        assert_eq!(store.get("a/b").await.unwrap(), b"hello".to_vec());
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = MemoryBlobStore::new();
        assert!(matches!(
            store.get("missing").await,
            Err(BlobStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn copy_tree_duplicates_prefix() {
        let store = MemoryBlobStore::new();
        store.put("active/s1/state.json", b"1".to_vec()).await.unwrap();
        store.put("active/s1/checkpoints/c1.json", b"2".to_vec()).await.unwrap();
        store.copy_tree("active/s1", "backups/s1-100").await.unwrap();
        assert_eq!(
            store.get("backups/s1-100/state.json").await.unwrap(),
            b"1".to_vec()
        );
        assert_eq!(
            store
                .get("backups/s1-100/checkpoints/c1.json")
                .await
                .unwrap(),
            b"2".to_vec()
        );
    }
}
