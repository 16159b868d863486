use std::error::Error;

use crate::StatusCode;

/// Расширение для ошибок библиотеки (object-safe).
///
/// Даёт каждой ошибке код статуса и метки для события в логе.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Код статуса. По умолчанию [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Пары ключ-значение, которые попадают в событие лога.
    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ]
    }

    /// Короткое имя типа ошибки.
    fn type_name(&self) -> String {
        std::any::type_name::<Self>()
            .split("::")
            .last()
            .unwrap_or("Unknown")
            .to_string()
    }
}
