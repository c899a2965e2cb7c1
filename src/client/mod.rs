//! Клиентская сторона протокола поверх внутрипроцессного транспорта.
//!
//! Клиент сопоставляет ответы запросам по `requestId`, ждёт их не дольше
//! [`ClientConfig::request_timeout_ms`](crate::config::ClientConfig) и
//! раскладывает события рассылки по потокам подписок.

mod channel_client;
mod events;

pub use channel_client::ChannelClient;
pub use events::{Event, EventStream};
