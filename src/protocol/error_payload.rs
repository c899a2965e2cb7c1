use postbridge_error::StackError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Тело отказа в нисходящем сообщении.
///
/// Ошибка обработчика никогда не пересылается как есть: она сводится к
/// стабильной схеме `{ kind, message, detail? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// snake_case категория, например `handler_failed` или `not_found`.
    pub kind: String,
    /// Сообщение, безопасное для показа клиенту.
    pub message: String,
    /// Цепочка контекстов, если обработчик её добавил.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorPayload {
    pub fn new(
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(
        mut self,
        detail: impl Into<String>,
    ) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn into_value(self) -> Value {
        // Сериализация структуры из строк не может завершиться ошибкой.
        serde_json::to_value(&self).unwrap_or(Value::Null)
    }
}

impl From<&StackError> for ErrorPayload {
    fn from(err: &StackError) -> Self {
        let payload = ErrorPayload::new(err.status_code().kind(), err.client_message());
        let contexts = err.context_messages();
        if contexts.is_empty() {
            payload
        } else {
            payload.with_detail(contexts.join(" → "))
        }
    }
}
