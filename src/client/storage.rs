//! Durable client-side key/value storage.
//!
//! Values are JSON documents under a handful of well-known keys. Two writers
//! on the same storage race with last-write-wins; nothing reconciles them.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

pub const CART_KEY: &str = "cart";
pub const WISHLIST_KEY: &str = "wishlist";
pub const USER_KEY: &str = "user";
pub const TOKEN_KEY: &str = "authToken";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid storage key {0:?}")]
    InvalidKey(String),

    #[error("storage unavailable")]
    Unavailable,
}

#[async_trait]
pub trait DurableStorage: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

pub async fn load_json<T: DeserializeOwned>(storage: &dyn DurableStorage, key: &str) -> Result<Option<T>, StorageError> {
    match storage.read(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn save_json<T: Serialize + ?Sized>(storage: &dyn DurableStorage, key: &str, value: &T) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    storage.write(key, &raw).await
}

/// In-process storage, for tests and headless shells.
#[derive(Debug, Default)]
pub struct MemoryStorage { entries: Mutex<HashMap<String, String>> }

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries.lock().map_err(|_| StorageError::Unavailable)
    }
}

#[async_trait]
impl DurableStorage for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> { Ok(self.entries()?.get(key).cloned()) }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage { dir: PathBuf }

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    fn path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl DurableStorage for FileStorage {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path(key)?).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes to a temporary file first so readers never see half a document.
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path(key)?).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state"));
        assert_eq!(storage.read(CART_KEY).await.unwrap(), None);

        save_json(&storage, CART_KEY, &vec![1, 2, 3]).await.unwrap();
        assert_eq!(load_json::<Vec<i32>>(&storage, CART_KEY).await.unwrap(), Some(vec![1, 2, 3]));

        storage.remove(CART_KEY).await.unwrap();
        storage.remove(CART_KEY).await.unwrap();
        assert_eq!(storage.read(CART_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_storage_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert!(matches!(storage.write("../escape", "{}").await, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_corrupt_value_is_an_error() {
        let storage = MemoryStorage::new();
        storage.write(WISHLIST_KEY, "{not json").await.unwrap();
        assert!(matches!(load_json::<Vec<i32>>(&storage, WISHLIST_KEY).await, Err(StorageError::Serde(_))));
    }
}
