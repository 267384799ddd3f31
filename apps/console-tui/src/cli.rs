use std::path::PathBuf;

use clap::Parser;
use covert_console_core::{
    ConsoleConfig,
    config::{DEFAULT_ENGINE_URL, DEFAULT_SNAPSHOT_FILE},
};

#[derive(Debug, Parser, Clone)]
#[command(name = "covert-console")]
#[command(about = "Operator console for a covert channel engine")]
pub struct Cli {
    /// WebSocket endpoint of the engine.
    #[arg(long, env = "COVERT_ENGINE_URL", default_value = DEFAULT_ENGINE_URL)]
    pub engine: String,

    /// File used by save and load.
    #[arg(long, env = "COVERT_SNAPSHOT", default_value = DEFAULT_SNAPSHOT_FILE)]
    pub snapshot: PathBuf,

    /// Write diagnostics here; nothing is logged without it.
    #[arg(long, env = "COVERT_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl From<Cli> for ConsoleConfig {
    fn from(cli: Cli) -> Self {
        let config = Self::new(cli.engine).with_snapshot_path(cli.snapshot);
        match cli.log_file {
            Some(path) => config.with_log_file(path),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: ConsoleConfig = Cli::parse_from(["covert-console"]).into();
        assert_eq!(config, ConsoleConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config: ConsoleConfig = Cli::parse_from([
            "covert-console",
            "--engine",
            "ws://10.1.1.1:9000/api/ws",
            "--snapshot",
            "/tmp/channel.txt",
            "--log-file",
            "/tmp/console.log",
        ])
        .into();
        assert_eq!(config.engine_url, "ws://10.1.1.1:9000/api/ws");
        assert_eq!(config.snapshot_path, PathBuf::from("/tmp/channel.txt"));
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/console.log")));
    }
}
