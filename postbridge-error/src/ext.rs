use std::{any::Any, error::Error};

use crate::StatusCode;

/// Расширение для ошибок канала (object-safe).
///
/// Любая ошибка, реализующая этот трейт, может быть превращена в
/// [`StackError`](crate::StackError) и далее в тело отказа
/// нисходящего сообщения:
/// - код статуса определяет `kind` тела и статус на проводе,
/// - `client_message` становится `message` тела,
/// - `log_message` уходит только в логи.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Статус ошибки.
    ///
    /// По умолчанию возвращает [`StatusCode::HandlerFailed`]: большинство
    /// ошибок, попадающих в сервис, приходят из пользовательских
    /// обработчиков.
    fn status_code(&self) -> StatusCode {
        StatusCode::HandlerFailed
    }

    /// Возвращает ошибку как [`Any`](std::any::Any),
    /// чтобы можно было выполнить downcast к конкретному типу.
    fn as_any(&self) -> &dyn Any;

    /// Безопасное сообщение для клиента.
    ///
    /// Для внутренних ошибок не раскрывает деталей и возвращает
    /// `"Internal service error"`.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::Unknown | StatusCode::Internal | StatusCode::Unexpected => {
                "Internal service error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Детализированное сообщение для логов.
    fn log_message(&self) -> String {
        format!("{self:?}")
    }

    /// Набор тегов для логов и метрик.
    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ]
    }

    /// Короткое имя типа ошибки (без пути модуля).
    fn type_name(&self) -> String {
        std::any::type_name::<Self>()
            .split("::")
            .last()
            .unwrap_or("Unknown")
            .to_string()
    }
}
