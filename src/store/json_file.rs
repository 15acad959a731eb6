//! JSON-file key-value store.
//!
//! The whole store is one JSON object on disk. Every write rewrites the file
//! through a sibling temp file and a rename, so a crash mid-write leaves the
//! previous contents intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::traits::KeyValueStore;
use crate::error::StorageError;

/// Durable store backed by a single JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`. Parent directories are
    /// created up front.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_error(parent, e))?;
            }
        }
        info!(path = %path.display(), "Profile store opened");
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, StorageError> {
        if !fs::try_exists(&self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?
        {
            return Ok(Map::new());
        }
        let raw = fs::read_to_string(&self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    async fn save(&self, map: &Map<String, Value>) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let map = self.load().await?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        map.insert(key.to_string(), value.clone());
        self.save(&map).await?;
        debug!(key, path = %self.path.display(), "Stored value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        if map.remove(key).is_some() {
            self.save(&map).await?;
            debug!(key, "Removed value");
        }
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn test_store() -> (JsonFileStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("kv.json")).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let (store, _dir) = test_store().await;
        assert!(store.get("anything").await.unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn set_then_get() {
        let (store, _dir) = test_store().await;
        store.set("k", &json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let (store, _dir) = test_store().await;
        store.set("one", &json!(1)).await.unwrap();
        store.set("two", &json!(2)).await.unwrap();
        store.remove("one").await.unwrap();
        assert!(store.get("one").await.unwrap().is_none());
        assert_eq!(store.get("two").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("kv.json");
        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.set("k", &json!("persisted")).await.unwrap();
        }
        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("k").await.unwrap(), Some(json!("persisted")));
    }

    #[tokio::test]
    async fn remove_missing_key_is_ok() {
        let (store, _dir) = test_store().await;
        store.remove("nope").await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let (store, _dir) = test_store().await;
        std::fs::write(store.path(), "{not json").unwrap();
        let err = store.get("k").await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }
}
