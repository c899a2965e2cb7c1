//! Абстракция транспорта, поверх которого работает протокол.
//!
//! Транспорт доставляет сервису восходящие сообщения вместе с адресом для
//! ответа ([`ReplyHandle`]). Ответ уходит ровно тому отправителю, чей адрес
//! захвачен, и только ему. Доставка best-effort: подтверждений нет.
//!
//! - `memory`: внутрипроцессная реализация на каналах tokio.

pub mod memory;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use postbridge_error::DeliveryError;

use crate::protocol::{DownstreamMessage, UpstreamMessage};

/// Стабильный идентификатор отправителя в пределах одного транспорта.
///
/// По нему сервис узнаёт повторную подписку того же клиента и находит его
/// при отписке.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Обратный адрес отправителя.
pub trait ReplySink: Send + Sync + fmt::Debug {
    /// Кому принадлежит адрес.
    fn peer_id(&self) -> PeerId;

    /// Отправляет сообщение получателю. Не блокирует и не ждёт доставки.
    fn post(
        &self,
        msg: DownstreamMessage,
    ) -> Result<(), DeliveryError>;
}

pub type ReplyHandle = Arc<dyn ReplySink>;

/// Входящее сообщение вместе с адресом для ответа.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub message: UpstreamMessage,
    pub reply_to: ReplyHandle,
}

impl Inbound {
    pub fn new(
        message: UpstreamMessage,
        reply_to: ReplyHandle,
    ) -> Self {
        Self { message, reply_to }
    }

    pub fn peer_id(&self) -> PeerId {
        self.reply_to.peer_id()
    }
}

/// Сервисная сторона транспорта: поток входящих сообщений.
#[async_trait]
pub trait Endpoint: Send + 'static {
    /// Ждёт следующее входящее сообщение. `None` — транспорт закрыт и больше
    /// ничего не доставит.
    async fn recv(&mut self) -> Option<Inbound>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_display_and_order() {
        let a = PeerId::new(1);
        let b = PeerId::new(2);
        assert!(a < b);
        assert_eq!(a.to_string(), "peer#1");
        assert_eq!(b.as_u64(), 2);
    }
}

/// Адрес для ответа, который просто запоминает отправленное. Для тестов.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug)]
    pub(crate) struct RecordingSink {
        id: PeerId,
        sent: Mutex<Vec<DownstreamMessage>>,
        gone: AtomicBool,
    }

    impl RecordingSink {
        pub(crate) fn new(id: u64) -> Arc<Self> {
            Arc::new(Self {
                id: PeerId::new(id),
                sent: Mutex::new(Vec::new()),
                gone: AtomicBool::new(false),
            })
        }

        /// Дальнейшие `post` будут завершаться ошибкой.
        pub(crate) fn disconnect(&self) {
            self.gone.store(true, Ordering::SeqCst);
        }

        pub(crate) fn sent(&self) -> Vec<DownstreamMessage> {
            self.sent.lock().clone()
        }
    }

    impl ReplySink for RecordingSink {
        fn peer_id(&self) -> PeerId {
            self.id
        }

        fn post(
            &self,
            msg: DownstreamMessage,
        ) -> Result<(), DeliveryError> {
            if self.gone.load(Ordering::SeqCst) {
                return Err(DeliveryError::PeerGone {
                    peer: self.id.as_u64(),
                });
            }
            self.sent.lock().push(msg);
            Ok(())
        }
    }
}
