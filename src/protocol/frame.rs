//! Типы фреймов RESP2.

use std::fmt;

/// Фреймы протокола RESP2.
///
/// Null bulk-строки и null-массивы отличаются от пустых.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespFrame {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR message\r\n`
    Error(String),
    /// `:42\r\n`
    Integer(i64),
    /// `$5\r\nhello\r\n`, для nil `$-1\r\n`
    Bulk(Option<Vec<u8>>),
    /// `*2\r\n...`, для nil `*-1\r\n`
    Array(Option<Vec<RespFrame>>),
}

impl RespFrame {
    /// Bulk-строка из произвольных байт.
    pub fn bulk(s: impl Into<Vec<u8>>) -> Self {
        Self::Bulk(Some(s.into()))
    }

    /// Массив bulk-строк: так выглядит любой клиентский запрос.
    pub fn request<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        Self::Array(Some(args.into_iter().map(Self::bulk).collect()))
    }

    /// Короткое название вида фрейма для сообщений об ошибках.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Simple(_) => "simple string",
            Self::Error(_) => "error",
            Self::Integer(_) => "integer",
            Self::Bulk(Some(_)) => "bulk string",
            Self::Bulk(None) => "nil",
            Self::Array(Some(_)) => "array",
            Self::Array(None) => "nil array",
        }
    }
}

impl fmt::Display for RespFrame {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Simple(s) => write!(f, "{s}"),
            Self::Error(e) => write!(f, "(error) {e}"),
            Self::Integer(i) => write!(f, "(integer) {i}"),
            Self::Bulk(Some(b)) => write!(f, "\"{}\"", String::from_utf8_lossy(b)),
            Self::Bulk(None) | Self::Array(None) => write!(f, "(nil)"),
            Self::Array(Some(items)) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}
