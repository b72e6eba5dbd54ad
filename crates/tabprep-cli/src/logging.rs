//! Logging infrastructure using `tracing` and `tracing-subscriber`.
//!
//! # Log Levels
//!
//! - `error`: fatal failures
//! - `warn`: data anomalies (non-positive log input, unseen categories)
//! - `info`: pipeline stage boundaries (fit pass, parquet writes)
//! - `debug`: per-operator application with affected-row counts
//!
//! # Usage
//!
//! ```ignore
//! use tabprep_cli::logging::{LogConfig, init_logging};
//!
//! init_logging(&LogConfig::default()).expect("init logging");
//! ```

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors.
    #[default]
    Pretty,
    /// Single-line human-readable format.
    Compact,
    /// Machine-parseable JSON lines.
    Json,
}

/// Configuration for logging behavior.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Maximum level to emit when no env filter applies.
    pub level_filter: LevelFilter,
    /// Honor `RUST_LOG` when set; falls back to `level_filter`.
    pub use_env_filter: bool,
    /// Output format.
    pub format: LogFormat,
    /// Write logs to this file instead of stderr.
    pub log_file: Option<PathBuf>,
    /// Use ANSI colors (ignored for file and JSON output).
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level_filter: LevelFilter::WARN,
            use_env_filter: true,
            format: LogFormat::default(),
            log_file: None,
            with_ansi: true,
        }
    }
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter = if config.use_env_filter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level_filter.to_string()))
    } else {
        EnvFilter::new(config.level_filter.to_string())
    };

    let file = match &config.log_file {
        Some(path) => Some(Mutex::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?,
        )),
        None => None,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match (config.format, file) {
        (LogFormat::Pretty, None) => builder.with_ansi(config.with_ansi).try_init(),
        (LogFormat::Pretty, Some(writer)) => {
            builder.with_ansi(false).with_writer(writer).try_init()
        }
        (LogFormat::Compact, None) => builder.with_ansi(config.with_ansi).compact().try_init(),
        (LogFormat::Compact, Some(writer)) => builder
            .with_ansi(false)
            .compact()
            .with_writer(writer)
            .try_init(),
        (LogFormat::Json, None) => builder.with_ansi(false).json().try_init(),
        (LogFormat::Json, Some(writer)) => builder
            .with_ansi(false)
            .json()
            .with_writer(writer)
            .try_init(),
    };
    result.map_err(|error| anyhow::anyhow!(error))
}
