use std::io;

use crate::{ErrorExt, StatusCode};

/// Ошибки запроса к хранилищу: сеть, протокол или ответ сервера.
#[derive(Debug, Clone)]
pub enum ClientError {
    /// Не удалось подключиться к серверу
    ConnectionFailed { address: String, reason: String },
    /// Таймаут подключения
    ConnectionTimeout { address: String },
    /// Сервер закрыл соединение
    ConnectionClosed,
    /// Ответ сервера `-ERR ...`
    ServerError { message: String },
    /// Ответ неожиданной для запроса формы
    UnexpectedResponse { command: String, got: String },
    /// AUTH отклонён
    AuthenticationFailed { reason: String },
    /// Ошибка ввода-вывода
    Io {
        kind: io::ErrorKind,
        message: String,
    },
    /// Некорректные данные RESP
    Protocol { reason: String },
    /// Текстовый ответ (`INFO`) не в UTF-8
    DecodingError { reason: String },
    ReadTimeout,
    WriteTimeout,
}

impl std::fmt::Display for ClientError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::ConnectionFailed { address, reason } => {
                write!(f, "Failed to connect to {address}: {reason}")
            }
            Self::ConnectionTimeout { address } => write!(f, "Connection to {address} timed out"),
            Self::ConnectionClosed => write!(f, "Connection closed by server"),
            Self::ServerError { message } => write!(f, "Server error: {message}"),
            Self::UnexpectedResponse { command, got } => {
                write!(f, "Unexpected response to {command}: {got}")
            }
            Self::AuthenticationFailed { reason } => {
                write!(f, "Authentication failed: {reason}")
            }
            Self::Io { kind, message } => write!(f, "I/O error ({kind:?}): {message}"),
            Self::Protocol { reason } => write!(f, "Protocol error: {reason}"),
            Self::DecodingError { reason } => write!(f, "Decoding error: {reason}"),
            Self::ReadTimeout => write!(f, "Read timeout"),
            Self::WriteTimeout => write!(f, "Write timeout"),
        }
    }
}

impl std::error::Error for ClientError {}

impl ErrorExt for ClientError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ConnectionFailed { .. } => StatusCode::ConnectionFailed,
            Self::ConnectionTimeout { .. } => StatusCode::Timeout,
            Self::ConnectionClosed => StatusCode::ConnectionClosed,
            Self::ServerError { .. } => StatusCode::ServerError,
            Self::UnexpectedResponse { .. } => StatusCode::UnexpectedResponse,
            Self::AuthenticationFailed { .. } => StatusCode::AuthFailed,
            Self::Io { kind, .. } => match kind {
                io::ErrorKind::ConnectionRefused => StatusCode::ConnectionFailed,
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe => StatusCode::ConnectionClosed,
                io::ErrorKind::TimedOut => StatusCode::Timeout,
                io::ErrorKind::UnexpectedEof => StatusCode::UnexpectedEof,
                _ => StatusCode::Io,
            },
            Self::Protocol { .. } => StatusCode::ProtocolError,
            Self::DecodingError { .. } => StatusCode::DecodingError,
            Self::ReadTimeout => StatusCode::ReadTimeout,
            Self::WriteTimeout => StatusCode::WriteTimeout,
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "client".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::ConnectionFailed { address, .. } | Self::ConnectionTimeout { address } => {
                tags.push(("address", address.clone()));
            }
            Self::UnexpectedResponse { command, .. } => {
                tags.push(("command", command.clone()));
            }
            Self::Io { kind, .. } => {
                tags.push(("io_kind", format!("{kind:?}")));
            }
            _ => {}
        }

        tags
    }
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
