//! JSON-кодек для передачи сообщений через границу контекстов.
//!
//! Сам протокол не привязан к формату, но транспорт, который гонит байты,
//! должен как-то их получить. Кодирование в JSON заодно гарантирует, что
//! получатель видит независимую копию значения.

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::TransportError;

/// Кодирует сообщение любого направления в байты.
pub fn encode<T: Serialize>(msg: &T) -> Result<Bytes, TransportError> {
    let raw = serde_json::to_vec(msg).map_err(TransportError::Encode)?;
    Ok(Bytes::from(raw))
}

/// Декодирует сообщение из байтов.
pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, TransportError> {
    serde_json::from_slice(frame).map_err(TransportError::Decode)
}
