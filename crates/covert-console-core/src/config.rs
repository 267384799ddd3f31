//! Runtime settings for a console session.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Engine address used when none is given.
pub const DEFAULT_ENGINE_URL: &str = "ws://127.0.0.1:8080/api/ws";

/// Snapshot file used when none is given.
pub const DEFAULT_SNAPSHOT_FILE: &str = "covert-config.txt";

/// Settings for one console session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// WebSocket endpoint of the engine.
    pub engine_url: String,

    /// Where saved configurations are written and read.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Diagnostics log file; the terminal belongs to the UI.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from(DEFAULT_SNAPSHOT_FILE)
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE_URL)
    }
}

impl ConsoleConfig {
    /// Settings for an engine endpoint, with default paths.
    #[must_use]
    pub fn new(engine_url: impl Into<String>) -> Self {
        Self {
            engine_url: engine_url.into(),
            snapshot_path: default_snapshot_path(),
            log_file: None,
        }
    }

    #[must_use]
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    #[must_use]
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }
}
