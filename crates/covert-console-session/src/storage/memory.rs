//! In-memory snapshot storage.

use std::sync::RwLock;

use async_trait::async_trait;
use covert_console_core::traits::{SnapshotStorage, StorageError};

/// In-memory storage implementation.
///
/// Useful for tests and throwaway sessions. Data is lost on restart.
pub struct MemoryStorage {
    name: String,
    blob: RwLock<Option<String>>,
}

impl MemoryStorage {
    /// Create an empty in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// Create an empty storage reported under `name` in log lines.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blob: RwLock::new(None),
        }
    }

    /// Storage that already holds `blob`.
    #[must_use]
    pub fn with_blob(blob: impl Into<String>) -> Self {
        let storage = Self::new();
        if let Ok(mut slot) = storage.blob.write() {
            *slot = Some(blob.into());
        }
        storage
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStorage for MemoryStorage {
    fn location(&self) -> String {
        self.name.clone()
    }

    async fn save(&self, blob: &str) -> Result<(), StorageError> {
        *self
            .blob
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))? = Some(blob.to_string());
        Ok(())
    }

    async fn load(&self) -> Result<String, StorageError> {
        self.blob
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .clone()
            .ok_or_else(|| StorageError::NotFound(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_replaces_previous_blob() {
        let storage = MemoryStorage::new();
        let missing = storage.load().await;
        assert!(matches!(missing, Err(StorageError::NotFound(_))));

        storage.save("{\"a\":1}").await.unwrap();
        storage.save("{\"b\":2}").await.unwrap();
        assert_eq!(storage.load().await.unwrap(), "{\"b\":2}");
    }

    #[test]
    fn test_with_blob_is_loadable() {
        let storage = MemoryStorage::with_blob("x");
        assert_eq!(tokio_test::block_on(storage.load()).unwrap(), "x");
    }
}
