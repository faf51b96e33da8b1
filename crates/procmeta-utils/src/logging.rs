//! # Logging Utilities
//!
//! Logging infrastructure for procmeta using `tracing`.
//!
//! This module provides structured logging with support for:
//! - Pretty (development) and JSON (machine-readable) output
//! - `RUST_LOG` filters, overridable by an explicit level
//! - Optional file output alongside the console
//!
//! Console output goes to stderr so command output on stdout stays clean.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use procmeta_utils::{init_logging, EnvConfig, LogConfig};
//!
//! let config = LogConfig::from_env(&EnvConfig::from_env());
//! let _guard = init_logging(&config).expect("Failed to initialize logging");
//! tracing::info!("Application started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Log filter (e.g., `RUST_LOG=debug`, `RUST_LOG=procmeta_core=trace`)
//! - `PROCMETA_LOG_FORMAT`: `json` or `pretty` (default: `pretty`)
//! - `PROCMETA_LOG_FILE`: Optional log file. A directory gets a dated file
//!   name (`YYYY-MM-DD-procmeta.log`); a file path rolls daily.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::io;

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::EnvConfig;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    Error,
    Warn,
    Info,
    Debug,
    /// Most verbose
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig
{
    /// Explicit level. Takes precedence over `RUST_LOG` when set.
    pub level: Option<LogLevel>,
    pub format: LogFormat,
    /// Optional log file or directory.
    pub file: Option<PathBuf>,
}

impl LogConfig
{
    /// Settings from the `PROCMETA_*` environment, with no explicit level.
    #[must_use]
    pub fn from_env(env: &EnvConfig) -> Self
    {
        Self {
            level: None,
            format: env.log_format,
            file: env.log_file.clone(),
        }
    }

    fn filter(&self) -> EnvFilter
    {
        match self.level {
            Some(level) => EnvFilter::new(Level::from(level).to_string()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string())),
        }
    }
}

/// Keeps the background file writer alive. Drop it last, after the final log
/// line, so buffered events are flushed.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard
{
    _file: Option<WorkerGuard>,
}

fn file_writer(path: &Path) -> io::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)>
{
    let appender = if path.is_dir() {
        let today = Utc::now().format("%Y-%m-%d");
        tracing_appender::rolling::never(path, format!("{today}-procmeta.log"))
    } else {
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent)?;
        tracing_appender::rolling::daily(parent, path.file_name().unwrap_or_default())
    };
    Ok(tracing_appender::non_blocking(appender))
}

/// Install the global subscriber described by `config`.
///
/// ## Errors
///
/// - `FileError`: the log file's directory cannot be created
/// - `InitializationFailed`: a global subscriber is already installed
pub fn init_logging(config: &LogConfig) -> Result<LogGuard, LoggingError>
{
    let (file, guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let result = match config.format {
        LogFormat::Pretty => {
            let console_layer = fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(true)
                .with_writer(io::stderr)
                .with_filter(config.filter());
            let file_layer = file.map(|writer| {
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false) // No ANSI in files
                    .with_filter(config.filter())
            });
            Registry::default().with(console_layer).with(file_layer).try_init()
        }
        LogFormat::Json => {
            let console_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_names(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(io::stderr)
                .with_filter(config.filter());
            let file_layer = file.map(|writer| {
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_filter(config.filter())
            });
            Registry::default().with(console_layer).with(file_layer).try_init()
        }
    };

    result.map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;
    Ok(LogGuard { _file: guard })
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Unknown log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Unknown log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// A global subscriber is already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_log_format_from_str()
    {
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("prod").unwrap(), LogFormat::Json);
        assert!(matches!(LogFormat::from_str("xml"), Err(LoggingError::InvalidFormat(_))));
    }

    #[test]
    fn test_log_level_from_str()
    {
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::from_str("dbg").unwrap(), LogLevel::Debug);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
        assert!(matches!(LogLevel::from_str("loud"), Err(LoggingError::InvalidLevel(_))));
    }

    #[test]
    fn test_config_from_env_leaves_level_to_rust_log()
    {
        let env = EnvConfig {
            log_format: LogFormat::Json,
            log_file: Some(PathBuf::from("/tmp/procmeta.log")),
            ..EnvConfig::default()
        };
        let config = LogConfig::from_env(&env);
        assert_eq!(config.level, None);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file.as_deref(), Some(Path::new("/tmp/procmeta.log")));
    }
}
