//! Errors of the crate-local layers. Store and pipeline errors live in the
//! `dump-error` crate.

use thiserror::Error;

/// Failure to load or validate [`crate::config::DumpSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration file not found: {0}")]
    MissingFile(String),

    #[error("Invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
