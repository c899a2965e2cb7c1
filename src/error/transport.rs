use postbridge_error::{DeliveryError, StackError};
use thiserror::Error;

/// Ошибки кодирования кадров транспорта.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),
}

impl From<TransportError> for DeliveryError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Encode(e) => DeliveryError::Encoding {
                reason: e.to_string(),
            },
            TransportError::Decode(e) => DeliveryError::Decoding {
                reason: e.to_string(),
            },
        }
    }
}

impl From<TransportError> for StackError {
    fn from(err: TransportError) -> Self {
        StackError::new(DeliveryError::from(err))
    }
}
