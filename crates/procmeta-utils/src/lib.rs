//! # procmeta Utilities
//!
//! Shared logging and configuration for the procmeta binaries.
//!
//! This crate provides logging infrastructure built on `tracing` and the
//! `PROCMETA_*` environment settings it is configured from.

pub mod config;
pub mod logging;

pub use config::EnvConfig;
// Re-export commonly used logging items for convenience
pub use logging::{init_logging, LogConfig, LogFormat, LogGuard, LogLevel, LoggingError};
pub use tracing::{debug, error, info, trace, warn};
