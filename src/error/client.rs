//! Ошибки клиента канала.

use postbridge_error::DeliveryError;
use thiserror::Error;

use crate::protocol::{ErrorPayload, Status};

pub type ClientResult<T> = Result<T, ClientError>;

/// Ошибки клиента канала.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Ответ не пришёл вовремя. Именно так клиент узнаёт, что сервис молча
    /// отбросил сообщение без получателя.
    #[error("no reply for `{destination}` ({request_id}) within {timeout_ms} ms")]
    Timeout {
        destination: String,
        request_id: String,
        timeout_ms: u64,
    },

    /// Сервис ответил отказом.
    #[error("`{destination}` rejected with status {}: {}", .status.code(), .error.message)]
    Rejected {
        destination: String,
        status: Status,
        error: ErrorPayload,
        description: Option<String>,
    },

    /// Соединение с сервисом закрыто.
    #[error("connection to channel service is closed")]
    Closed,

    /// Не удалось отправить сообщение.
    #[error("failed to send: {0}")]
    Send(#[from] DeliveryError),

    /// Тело ответа не подходит под ожидаемый тип.
    #[error("unexpected response body: {0}")]
    Body(#[from] serde_json::Error),
}
