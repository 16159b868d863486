use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки самого конвейера дампа (не транспорта).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DumpError {
    /// Хранилище вернуло тип, который дамп не умеет восстановить.
    #[error("Key {key} is of unrecognized type {type_name}")]
    UnrecognizedType { key: String, type_name: String },

    /// Строка `db<N>:` отчёта keyspace с некорректным индексом.
    #[error("Invalid database index in keyspace line '{line}'")]
    InvalidDbIndex { line: String },

    /// Индекс базы больше настроенного максимума.
    #[error("Database index {index} exceeds the maximum of {max}")]
    DbIndexOutOfRange { index: u64, max: u32 },

    /// Некорректные параметры дампа.
    #[error("Invalid dump options: {reason}")]
    InvalidOptions { reason: String },

    /// Задача воркера завершилась аварийно.
    #[error("Worker task failed: {reason}")]
    WorkerFailed { reason: String },
}

impl ErrorExt for DumpError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnrecognizedType { .. } => StatusCode::UnrecognizedType,
            Self::InvalidDbIndex { .. } => StatusCode::ParseError,
            Self::DbIndexOutOfRange { .. } => StatusCode::OutOfRange,
            Self::InvalidOptions { .. } => StatusCode::InvalidArgs,
            Self::WorkerFailed { .. } => StatusCode::Internal,
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "dump".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        if let Self::UnrecognizedType { key, type_name } = self {
            tags.push(("key", key.clone()));
            tags.push(("key_type", type_name.clone()));
        }

        tags
    }
}
