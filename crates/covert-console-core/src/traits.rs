//! Seams to the outside world: the engine connection and snapshot persistence.

use async_trait::async_trait;
use thiserror::Error;

/// Transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Connection closed")]
    Closed,
    #[error("Send failed: {0}")]
    Send(String),
    #[error("Receive failed: {0}")]
    Receive(String),
}

/// A message-based, bidirectional connection carrying one JSON text per message.
#[async_trait]
pub trait Transport: Send {
    /// Send one message.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Receive the next message; `None` once the peer has gone away.
    ///
    /// Must be cancel-safe: dropping the future loses no message.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No saved configuration at {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Byte-level persistence of an exported configuration snapshot.
///
/// The blob is opaque here; parsing belongs to the configuration store.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Human-readable location, for log lines.
    fn location(&self) -> String;

    /// Persist a blob, replacing any earlier one.
    async fn save(&self, blob: &str) -> Result<(), StorageError>;

    /// Read the saved blob.
    async fn load(&self) -> Result<String, StorageError>;
}
