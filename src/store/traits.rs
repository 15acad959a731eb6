//! `KeyValueStore` trait: the single async interface for local persistence.
//!
//! Values are JSON blobs addressed by a namespaced key, the same way a browser's
//! local storage holds one serialized record per key.

use async_trait::async_trait;

use crate::error::StorageError;

/// Backend-agnostic durable key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
