//! Key-value persistence backends.
//!
//! The store persists through a flat `get/set/remove` interface so the
//! engine never knows where durable bytes live. [`MemoryStorage`] backs
//! tests and persist-disabled sessions; [`FileStorage`] keeps a JSON map in
//! a single file on disk.
//!
//! ERROR HANDLING
//! ==============
//! Every operation surfaces I/O and serialization failures to the caller.
//! The store decides what survives a failed write — silent loss of the only
//! durable copy is never acceptable here.

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Error returned by [`Storage`] operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization failure: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Flat key-value persistence boundary.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value stored under `key`. Removing an absent key is a no-op.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory backend for tests and persist-disabled sessions.
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.lock().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.lock().await.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.lock().await.remove(key);
        Ok(())
    }
}

/// File-backed storage: one JSON object per file, keys mapping to string
/// values. Reads tolerate a missing file (empty map); every write rewrites
/// the whole map, which is fine at the scale of one record list per key.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_map(&self) -> Result<HashMap<String, String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn write_map(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        let text = serde_json::to_string(map)?;
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_map().await?.remove(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut map = self.read_map().await?;
        map.insert(key.to_owned(), value.to_owned());
        self.write_map(&map).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.read_map().await?;
        if map.remove(key).is_some() {
            self.write_map(&map).await?;
        }
        Ok(())
    }
}
