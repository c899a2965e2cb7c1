use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки доставки сообщения через транспорт.
///
/// Сервис никогда не отдаёт их отправителю: доставка best-effort, ошибка
/// только логируется.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Получатель отключился (его сторона канала закрыта).
    PeerGone { peer: u64 },
    /// Транспорт закрыт целиком.
    Closed,
    /// Сообщение не удалось закодировать для передачи.
    Encoding { reason: String },
    /// Пришедший кадр не удалось разобрать.
    Decoding { reason: String },
}

impl std::fmt::Display for DeliveryError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::PeerGone { peer } => write!(f, "Peer #{peer} is gone"),
            Self::Closed => write!(f, "Transport is closed"),
            Self::Encoding { reason } => write!(f, "Failed to encode message: {reason}"),
            Self::Decoding { reason } => write!(f, "Failed to decode frame: {reason}"),
        }
    }
}

impl std::error::Error for DeliveryError {}

impl ErrorExt for DeliveryError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::PeerGone { .. } => StatusCode::PeerGone,
            Self::Closed => StatusCode::TransportClosed,
            Self::Encoding { .. } => StatusCode::EncodingError,
            Self::Decoding { .. } => StatusCode::DecodingError,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "delivery".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        if let Self::PeerGone { peer } = self {
            tags.push(("peer", peer.to_string()));
        }
        tags
    }
}
