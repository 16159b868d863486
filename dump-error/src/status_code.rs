use std::fmt;

/// Коды статуса для классификации ошибок.
///
/// # Диапазоны:
/// - 1xxx: общие ошибки
/// - 2xxx: ошибки данных (ключи, типы, отчёт keyspace)
/// - 3xxx: аутентификация
/// - 6xxx: сеть / IO
/// - 8xxx: ошибки протокола
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 1xxx: Общие ===
    Internal = 1003,
    InvalidArgs = 1004,

    // === 2xxx: Данные ===
    UnrecognizedType = 2002,
    OutOfRange = 2010,

    // === 3xxx: Аутентификация ===
    AuthFailed = 3000,

    // === 6xxx: Сеть/IO ===
    Io = 6000,
    ConnectionClosed = 6001,
    Timeout = 6002,
    ConnectionFailed = 6004,
    ReadTimeout = 6005,
    WriteTimeout = 6006,
    UnexpectedEof = 6007,
    ServerError = 6008,

    // === 8xxx: Протокол ===
    ProtocolError = 8000,
    ParseError = 8009,
    DecodingError = 8011,
    UnexpectedResponse = 8012,
}

/// Уровень, на котором логируется сбой.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое значение кода.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// `true`, если соединению, на котором возникла ошибка, больше нельзя
    /// доверять: поток запросов и ответов мог рассинхронизироваться или
    /// сокет закрыт.
    ///
    /// После ответа сервера с ошибкой (`-ERR ...`) соединение пригодно.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Io
                | Self::ConnectionClosed
                | Self::Timeout
                | Self::ConnectionFailed
                | Self::ReadTimeout
                | Self::WriteTimeout
                | Self::UnexpectedEof
                | Self::ProtocolError
                | Self::DecodingError
                | Self::UnexpectedResponse
        )
    }

    /// Рекомендуемый уровень лога для кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Internal | Self::ConnectionFailed | Self::AuthFailed => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
