//! Настройка подписчика `tracing`.
//!
//! Логи всегда идут в stderr: в stdout может писаться сам дамп.

mod filters;
mod formatter;

use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use filters::{build_filter, level_for};
pub use formatter::build_layer;

/// Вид строки лога.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Многострочный, для человека
    Pretty,
    /// Одна строка на событие
    #[default]
    Compact,
    /// Один JSON-объект на событие
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(LoggingError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Директива фильтра, если `RUST_LOG` не задан
    pub level: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            with_ansi: true,
            with_target: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unknown log format '{0}' (expected pretty, compact or json)")]
    UnknownFormat(String),
    #[error("invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },
    #[error("logging is already initialised: {0}")]
    AlreadyInitialised(String),
}

/// Устанавливает глобальный подписчик.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(&config.level)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(build_layer(config))
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialised(e.to_string()))?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.level,
        format = ?config.format,
        "logging initialised"
    );
    Ok(())
}
