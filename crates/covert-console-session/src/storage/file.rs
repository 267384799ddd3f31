//! File-backed snapshot storage.

use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use covert_console_core::traits::{SnapshotStorage, StorageError};

/// Keeps the snapshot in one plain-text file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotStorage for FileStorage {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn save(&self, blob: &str) -> Result<(), StorageError> {
        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, blob).await?;
        tracing::debug!(
            path = %self.path.display(),
            bytes = blob.len(),
            "Snapshot written"
        );
        Ok(())
    }

    async fn load(&self) -> Result<String, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(blob) => Ok(blob),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(self.location()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
