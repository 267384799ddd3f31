//! In-memory transport pair.

use async_trait::async_trait;
use covert_console_core::traits::{Transport, TransportError};
use tokio::sync::mpsc;

/// One end of an in-process connection.
///
/// Messages sent on one end arrive, in order, on the other. Closing or
/// dropping one end ends the other's stream.
pub struct MemoryTransport {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl MemoryTransport {
    /// Create two connected ends.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (left_tx, right_rx) = mpsc::unbounded_channel();
        let (right_tx, left_rx) = mpsc::unbounded_channel();

        let left = Self {
            tx: Some(left_tx),
            rx: left_rx,
        };
        let right = Self {
            tx: Some(right_tx),
            rx: right_rx,
        };

        (left, right)
    }

    /// Receive without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.tx
            .as_ref()
            .ok_or(TransportError::Closed)?
            .send(text)
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        self.rx.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_messages_cross_in_order() {
        let (mut console, mut engine) = MemoryTransport::pair();
        console.send("one".to_string()).await.unwrap();
        console.send("two".to_string()).await.unwrap();

        assert_eq!(engine.recv().await.unwrap().unwrap(), "one");
        assert_eq!(engine.recv().await.unwrap().unwrap(), "two");
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (mut console, mut engine) = MemoryTransport::pair();
        console.close().await.unwrap();

        assert!(engine.recv().await.is_none());
        assert!(matches!(
            console.send("late".to_string()).await,
            Err(TransportError::Closed)
        ));
    }
}
