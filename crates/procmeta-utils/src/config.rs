//! # Environment Configuration
//!
//! `PROCMETA_*` environment variables, read once at startup. Command-line
//! flags override these values.
//!
//! | Variable                    | Effect                                        |
//! |-----------------------------|-----------------------------------------------|
//! | `PROCMETA_LOG_FORMAT`       | `pretty` (default) or `json`                  |
//! | `PROCMETA_LOG_FILE`         | also log to this file or directory            |
//! | `PROCMETA_NO_SYMBOLS`       | skip symbol table and DWARF loading           |
//! | `PROCMETA_NO_EXPORT_LABELS` | skip automatic labels for in-memory modules   |
//!
//! Boolean variables are set by `1`, `true`, `yes` or `on` (any case).

use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::logging::LogFormat;

pub const LOG_FORMAT_VAR: &str = "PROCMETA_LOG_FORMAT";
pub const LOG_FILE_VAR: &str = "PROCMETA_LOG_FILE";
pub const NO_SYMBOLS_VAR: &str = "PROCMETA_NO_SYMBOLS";
pub const NO_EXPORT_LABELS_VAR: &str = "PROCMETA_NO_EXPORT_LABELS";

/// Settings taken from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig
{
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
    pub no_symbols: bool,
    pub no_export_labels: bool,
}

impl EnvConfig
{
    /// Read the process environment.
    #[must_use]
    pub fn from_env() -> Self
    {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// An unparsable `PROCMETA_LOG_FORMAT` falls back to the default format
    /// with a warning.
    ///
    /// ```rust
    /// use procmeta_utils::{EnvConfig, LogFormat};
    ///
    /// let config = EnvConfig::from_lookup(|name| match name {
    ///     "PROCMETA_LOG_FORMAT" => Some("json".to_string()),
    ///     "PROCMETA_NO_SYMBOLS" => Some("1".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(config.log_format, LogFormat::Json);
    /// assert!(config.no_symbols);
    /// assert!(!config.no_export_labels);
    /// ```
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self
    {
        let log_format = match lookup(LOG_FORMAT_VAR) {
            Some(value) => value.parse().unwrap_or_else(|err| {
                warn!(%err, "ignoring {LOG_FORMAT_VAR}");
                LogFormat::default()
            }),
            None => LogFormat::default(),
        };

        Self {
            log_format,
            log_file: lookup(LOG_FILE_VAR).filter(|value| !value.is_empty()).map(PathBuf::from),
            no_symbols: lookup(NO_SYMBOLS_VAR).is_some_and(|value| is_truthy(&value)),
            no_export_labels: lookup(NO_EXPORT_LABELS_VAR).is_some_and(|value| is_truthy(&value)),
        }
    }
}

fn is_truthy(value: &str) -> bool
{
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
