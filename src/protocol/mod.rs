//! Протокол канала: форма сообщений на проводе.
//!
//! - `message`: восходящие и нисходящие сообщения, их типы и статусы.
//! - `error_payload`: стабильная схема тела отказа.
//! - `codec`: JSON-кодирование для транспортов, передающих байты.

pub mod codec;
pub mod error_payload;
pub mod message;

pub use error_payload::ErrorPayload;
pub use message::*;
