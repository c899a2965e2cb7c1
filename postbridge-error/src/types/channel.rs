use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки, которые сервис канала формирует сам при обработке входящих
/// сообщений.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Для назначения нет ни обработчика запросов, ни записи наблюдения.
    #[error("destination `{destination}` is not registered")]
    Unroutable { destination: String },

    /// Тело запроса не удалось привести к типу, который ждёт обработчик.
    #[error("invalid body for `{destination}`: {reason}")]
    InvalidBody { destination: String, reason: String },

    /// Обработчик запроса завершился паникой.
    #[error("handler for `{destination}` panicked: {message}")]
    HandlerPanicked {
        destination: String,
        message: String,
    },

    /// Хук подписки завершился паникой.
    #[error("subscribe hook for `{destination}` panicked: {message}")]
    HookPanicked {
        destination: String,
        message: String,
    },
}

impl ErrorExt for ChannelError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unroutable { .. } => StatusCode::NotFound,
            Self::InvalidBody { .. } => StatusCode::InvalidData,
            Self::HandlerPanicked { .. } => StatusCode::Panicked,
            Self::HookPanicked { .. } => StatusCode::HookFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            // Текст паники может содержать внутренние детали.
            Self::HandlerPanicked { destination, .. } => {
                format!("handler for `{destination}` panicked")
            }
            Self::HookPanicked { destination, .. } => {
                format!("subscribe hook for `{destination}` panicked")
            }
            other => other.to_string(),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "channel".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::Unroutable { destination }
            | Self::InvalidBody { destination, .. }
            | Self::HandlerPanicked { destination, .. }
            | Self::HookPanicked { destination, .. } => {
                tags.push(("destination", destination.clone()));
            }
        }

        tags
    }
}
