//! Filesystem-backed `BlobStore`. Writes go through a temp file plus atomic
//! rename so a crash mid-write never leaves a torn file behind, satisfying
//! the "survive crashes between puts" contract.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{BlobStoreError, Result};

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn io_err(err: std::io::Error) -> BlobStoreError {
        BlobStoreError::Io(err.to_string())
    }
}

#[async_trait]
impl super::BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let dest = self.path_for(key);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await.map_err(Self::io_err)?;
        }
        let tmp = dest.with_extension(format!(
            "{}.tmp",
            dest.extension().and_then(|e| e.to_str()).unwrap_or("")
        ));
        {
            let mut file = fs::File::create(&tmp).await.map_err(Self::io_err)?;
            file.write_all(&bytes).await.map_err(Self::io_err)?;
            file.sync_all().await.map_err(Self::io_err)?;
        }
        fs::rename(&tmp, &dest).await.map_err(Self::io_err)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        fs::read(self.path_for(key)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BlobStoreError::NotFound(key.to_string())
            } else {
                Self::io_err(e)
            }
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        fs::remove_file(self.path_for(key)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BlobStoreError::NotFound(key.to_string())
            } else {
                Self::io_err(e)
            }
        })
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        collect_keys(&self.root, &self.root.join(prefix), &mut keys)
            .await
            .map_err(Self::io_err)?;
        keys.sort();
        Ok(keys)
    }

    async fn ensure_prefix(&self, prefix: &str) -> Result<()> {
        fs::create_dir_all(self.path_for(prefix))
            .await
            .map_err(Self::io_err)
    }

    async fn copy_tree(&self, src: &str, dst: &str) -> Result<()> {
        let src_path = self.path_for(src);
        let dst_path = self.path_for(dst);
        copy_dir_recursive(&src_path, &dst_path)
            .await
            .map_err(Self::io_err)
    }
}

async fn collect_keys(root: &Path, dir: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
    if !fs::try_exists(dir).await? {
        return Ok(());
    }
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_dir() {
            Box::pin(collect_keys(root, &path, out)).await?;
        } else {
            let rel = path.strip_prefix(root).unwrap_or(&path);
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

async fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    if !fs::try_exists(src).await? {
        return Ok(());
    }
    fs::create_dir_all(dst).await?;
    let mut entries = fs::read_dir(src).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let dest = dst.join(entry.file_name());
        if path.is_dir() {
            Box::pin(copy_dir_recursive(&path, &dest)).await?;
        } else {
            fs::copy(&path, &dest).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::BlobStore;
    use super::*;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.put("metadata/s1.json", b"{}".to_vec()).await.unwrap();
        assert_eq!(store.get("metadata/s1.json").await.unwrap(), b"{}".to_vec());
        store.delete("metadata/s1.json").await.unwrap();
        assert!(store.get("metadata/s1.json").await.is_err());
    }

    #[tokio::test]
    async fn list_prefix_is_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.put("active/b/state.json", b"1".to_vec()).await.unwrap();
        store.put("active/a/state.json", b"1".to_vec()).await.unwrap();
        let keys = store.list_prefix("active").await.unwrap();
        assert_eq!(keys, vec!["active/a/state.json", "active/b/state.json"]);
    }
}
