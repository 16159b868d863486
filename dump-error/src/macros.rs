/// Досрочный возврат с ошибкой (как `anyhow::bail!`).
///
/// Формы:
/// - `bail!(err)`: любая ошибка, приводимая к `StackError`;
/// - `bail!(code, "msg")`: `GenericError` с указанным кодом;
/// - `bail!(code, "fmt {}", arg)`: то же с форматированным сообщением.
///
/// ```ignore
/// use dump_error::{bail, StatusCode};
///
/// fn check_workers(n: usize) -> dump_error::DumpResult<()> {
///     if n == 0 {
///         bail!(StatusCode::InvalidArgs, "worker count must be positive");
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($crate::StackError::from($err))
    };
    ($code:expr, $msg:expr) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, $msg)
        ))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, format!($fmt, $($arg)*))
        ))
    };
}

/// Вызывает `bail!`, если условие ложно. Формы те же, что у `bail!`.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            $crate::bail!($err);
        }
    };
    ($cond:expr, $code:expr, $msg:expr) => {
        if !($cond) {
            $crate::bail!($code, $msg);
        }
    };
    ($cond:expr, $code:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($code, $fmt, $($arg)*);
        }
    };
}

/// Добавляет контекст к `Result`, превращая ошибку в `StackError`.
#[macro_export]
macro_rules! context {
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => Ok(val),
            Err(e) => Err($crate::StackError::from(e).context($msg)),
        }
    };
    ($result:expr, $fmt:expr, $($arg:tt)*) => {
        match $result {
            Ok(val) => Ok(val),
            Err(e) => Err($crate::StackError::from(e).context(format!($fmt, $($arg)*))),
        }
    };
}

/// Расширение `Result`: `.context(...)` и `.with_context(...)`.
pub trait ResultExt<T> {
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>;

    /// Ленивый вариант: замыкание вызывается только при ошибке.
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<crate::StackError>,
{
    #[track_caller]
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
    {
        self.map_err(|e| e.into().context(ctx))
    }

    #[track_caller]
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().context(f()))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientError, DumpResult, GenericError, StatusCode};

    #[test]
    fn test_bail_with_format() {
        fn example(workers: usize) -> DumpResult<()> {
            bail!(StatusCode::InvalidArgs, "invalid worker count: {}", workers);
        }

        let err = example(0).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgs);
        assert!(err.to_string().contains("invalid worker count: 0"));
    }

    #[test]
    fn test_bail_typed_error() {
        fn example() -> DumpResult<()> {
            bail!(ClientError::ConnectionClosed);
        }

        assert_eq!(
            example().unwrap_err().status_code(),
            StatusCode::ConnectionClosed
        );
    }

    #[test]
    fn test_ensure() {
        fn validate(batch_size: usize) -> DumpResult<()> {
            ensure!(batch_size > 0, StatusCode::InvalidArgs, "batch size must be positive");
            ensure!(
                batch_size <= 10_000,
                StatusCode::InvalidArgs,
                "batch size too large: {}",
                batch_size
            );
            Ok(())
        }

        assert!(validate(100).is_ok());
        assert!(validate(0).is_err());
        assert!(validate(20_000).is_err());
    }

    #[test]
    fn test_context_macro() {
        let res: Result<(), GenericError> = Err(GenericError::new(StatusCode::Io, "reset"));
        let wrapped: DumpResult<()> = context!(res, "KEYS {}", "*");
        let err = wrapped.unwrap_err();
        assert_eq!(err.contexts()[0].message, "KEYS *");
    }

    #[test]
    fn test_result_ext_lazy() {
        let mut called = false;
        let ok: Result<u8, GenericError> = Ok(1);
        let _ = ok.with_context(|| {
            called = true;
            "never"
        });
        assert!(!called);

        let err: Result<u8, GenericError> = Err(GenericError::new(StatusCode::Io, "x"));
        let err = err.context("GET k").unwrap_err();
        assert_eq!(err.contexts().len(), 1);
        assert_eq!(err.contexts()[0].message, "GET k");
    }
}
