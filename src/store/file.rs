//! File-backed [`BlobStore`]: one `<key>.json` file per key in a directory.
//!
//! Writes go to a uniquely named temporary sibling which is then renamed
//! over the target, so readers see either the old or the new value, never a
//! torn one, and two writers never share a temporary file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use super::{BlobStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Open the store, creating `dir` if it does not exist
    pub async fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await.map_err(|e| {
            StoreError::unavailable_with(format!("cannot create {}", dir.display()), e)
        })?;
        tracing::debug!("File store directory ready: {}", dir.display());
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::unavailable(format!(
                "key '{}' cannot be used as a file name",
                key
            )));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::unavailable_with(
                format!("cannot read {}", path.display()),
                e,
            )),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        fs::write(&tmp, &value).await.map_err(|e| {
            StoreError::unavailable_with(format!("cannot write {}", tmp.display()), e)
        })?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::unavailable_with(
                format!("cannot replace {}", path.display()),
                e,
            ));
        }
        Ok(())
    }

    async fn ping(&self) -> StoreResult<String> {
        let metadata = fs::metadata(&self.dir).await.map_err(|e| {
            StoreError::unavailable_with(format!("cannot stat {}", self.dir.display()), e)
        })?;
        if !metadata.is_dir() {
            return Err(StoreError::unavailable(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }
        Ok(self.dir.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Item;
    use crate::store::{BlobItemStore, ItemStore, WriteTicket};
    use chrono::Utc;
    use serde_json::{json, Map};

    #[tokio::test]
    async fn test_open_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data").join("items");
        let store = FileBlobStore::open(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.ping().await.unwrap(), nested.display().to_string());
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get("items").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).await.unwrap();
        store.set("items", b"[1]".to_vec()).await.unwrap();
        store.set("items", b"[2]".to_vec()).await.unwrap();

        assert_eq!(store.get("items").await.unwrap(), Some(b"[2]".to_vec()));
        assert!(dir.path().join("items.json").is_file());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sets_never_tear() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FileBlobStore::open(dir.path()).await.unwrap());
        let values: Vec<Vec<u8>> = (0..16u8).map(|n| vec![b'a' + n; 64 * 1024]).collect();

        let tasks: Vec<_> = values
            .iter()
            .cloned()
            .map(|value| {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move { store.set("items", value).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = store.get("items").await.unwrap().unwrap();
        assert!(values.contains(&stored));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_path_like_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBlobStore::open(dir.path()).await.unwrap();
        let err = store.get("../escape").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_items_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut fields = Map::new();
        fields.insert("name".to_string(), json!("Widget"));
        let item = Item::new("1".to_string(), fields, Utc::now());

        {
            let store = BlobItemStore::new(FileBlobStore::open(dir.path()).await.unwrap(), "items");
            store.insert(&item, &WriteTicket::new()).await.unwrap();
        }

        let store = BlobItemStore::new(FileBlobStore::open(dir.path()).await.unwrap(), "items");
        assert_eq!(store.get_by_id("1").await.unwrap(), item);
    }

    #[tokio::test]
    async fn test_garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("items.json"), "garbage").unwrap();
        let store = BlobItemStore::new(FileBlobStore::open(dir.path()).await.unwrap(), "items");

        let err = ItemStore::load_all(&store).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
