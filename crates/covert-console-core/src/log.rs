//! Operator-visible message log with broadcast + history.
//!
//! Two append-only streams are kept: system status lines and received
//! covert payloads. Views that attach late read the history, then follow
//! live updates.

use std::{
    fmt,
    sync::{PoisonError, RwLock},
};

use chrono::{DateTime, Local};
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Live update buffer size.
const LIVE_CAPACITY: usize = 1024;

/// Which stream an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    System,
    Covert,
}

/// One timestamped log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub stream: LogStream,
    pub at: DateTime<Local>,
    pub text: String,
}

impl LogEntry {
    #[must_use]
    pub fn new(stream: LogStream, text: impl Into<String>) -> Self {
        Self {
            stream,
            at: Local::now(),
            text: text.into(),
        }
    }

    /// Timestamp as shown in the console, `HH:MM:SS.mmm`.
    #[must_use]
    pub fn timestamp(&self) -> String {
        self.at.format("%H:%M:%S%.3f").to_string()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp(), self.text)
    }
}

#[derive(Default)]
struct Inner {
    system: Vec<LogEntry>,
    covert: Vec<LogEntry>,
}

/// Append-only system and covert message logs.
pub struct MessageLog {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<LogEntry>,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MessageLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MessageLog")
            .field("system", &inner.system.len())
            .field("covert", &inner.covert.len())
            .finish()
    }
}

impl MessageLog {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            inner: RwLock::new(Inner::default()),
            sender,
        }
    }

    /// Append an entry and notify live listeners.
    pub fn push(&self, entry: LogEntry) {
        let _ = self.sender.send(entry.clone()); // no listeners is fine
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match entry.stream {
            LogStream::System => inner.system.push(entry),
            LogStream::Covert => inner.covert.push(entry),
        }
    }

    /// Append a system status line.
    pub fn system<S: Into<String>>(&self, text: S) {
        let entry = LogEntry::new(LogStream::System, text);
        tracing::info!(target: "console", "{}", entry.text);
        self.push(entry);
    }

    /// Append a received covert payload, verbatim.
    pub fn covert<S: Into<String>>(&self, payload: S) {
        self.push(LogEntry::new(LogStream::Covert, payload));
    }

    #[must_use]
    pub fn system_entries(&self) -> Vec<LogEntry> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .system
            .clone()
    }

    #[must_use]
    pub fn covert_entries(&self) -> Vec<LogEntry> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .covert
            .clone()
    }

    /// Received payload texts, oldest first.
    #[must_use]
    pub fn covert_payloads(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .covert
            .iter()
            .map(|e| e.text.clone())
            .collect()
    }

    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        (inner.system.len(), inner.covert.len())
    }

    /// Get a receiver for live updates.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    /// Stream that yields history first, then live updates.
    ///
    /// History is interleaved by timestamp across both streams.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, LogEntry> {
        let (mut history, rx) = (self.history(), self.subscribe());
        history.sort_by_key(|e| e.at);

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });
        Box::pin(hist.chain(live))
    }

    fn history(&self) -> Vec<LogEntry> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.system.iter().chain(&inner.covert).cloned().collect()
    }
}
