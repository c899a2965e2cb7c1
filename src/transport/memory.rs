//! Внутрипроцессный транспорт.
//!
//! Моделирует два изолированных контекста: всё, что пересекает границу,
//! кодируется в байты и декодируется на другой стороне, поэтому общих
//! ссылок между сервисом и клиентами не бывает.
//!
//! ```text
//! MemoryPeer ──Frame──▶ MemoryEndpoint ──▶ ChannelService
//!     ▲                                         │
//!     └──────────── Bytes (MemoryReplySink) ◀───┘
//! ```

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use postbridge_error::DeliveryError;
use tokio::sync::mpsc;
use tracing::warn;

use super::{Endpoint, Inbound, PeerId, ReplySink};
use crate::protocol::{codec, DownstreamMessage, UpstreamMessage};

/// Кадр от клиента: закодированное сообщение плюс обратный адрес.
#[derive(Debug)]
struct Frame {
    peer: PeerId,
    data: Bytes,
    reply: mpsc::UnboundedSender<Bytes>,
}

/// Создаёт транспорт: сервисную точку и фабрику клиентских подключений.
pub fn channel() -> (MemoryEndpoint, MemoryConnector) {
    let (tx, rx) = mpsc::unbounded_channel();
    let endpoint = MemoryEndpoint { inbox: rx };
    let connector = MemoryConnector {
        inbox: tx,
        next_peer: Arc::new(AtomicU64::new(0)),
    };
    (endpoint, connector)
}

////////////////////////////////////////////////////////////////////////////////
// Сервисная сторона
////////////////////////////////////////////////////////////////////////////////

/// Сервисная точка транспорта.
#[derive(Debug)]
pub struct MemoryEndpoint {
    inbox: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl Endpoint for MemoryEndpoint {
    async fn recv(&mut self) -> Option<Inbound> {
        loop {
            let frame = self.inbox.recv().await?;
            match codec::decode::<UpstreamMessage>(&frame.data) {
                Ok(message) => {
                    let reply_to = Arc::new(MemoryReplySink {
                        peer: frame.peer,
                        tx: frame.reply,
                    });
                    return Some(Inbound::new(message, reply_to));
                }
                Err(e) => {
                    // Отправителю некуда сообщить: у кадра нет requestId.
                    warn!(peer = %frame.peer, error = %e, "Dropping undecodable frame");
                }
            }
        }
    }
}

/// Обратный адрес клиента в памяти.
#[derive(Debug)]
pub struct MemoryReplySink {
    peer: PeerId,
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ReplySink for MemoryReplySink {
    fn peer_id(&self) -> PeerId {
        self.peer
    }

    fn post(
        &self,
        msg: DownstreamMessage,
    ) -> Result<(), DeliveryError> {
        let data = codec::encode(&msg)?;
        self.tx.send(data).map_err(|_| DeliveryError::PeerGone {
            peer: self.peer.as_u64(),
        })
    }
}

////////////////////////////////////////////////////////////////////////////////
// Клиентская сторона
////////////////////////////////////////////////////////////////////////////////

/// Фабрика клиентских подключений. Дешёво клонируется.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    inbox: mpsc::UnboundedSender<Frame>,
    next_peer: Arc<AtomicU64>,
}

impl MemoryConnector {
    /// Подключает нового клиента со своим идентификатором и почтовым ящиком.
    pub fn connect(&self) -> MemoryPeer {
        let peer = PeerId::new(self.next_peer.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = mpsc::unbounded_channel();
        MemoryPeer {
            sender: PeerSender {
                peer,
                inbox: self.inbox.clone(),
                reply: tx,
            },
            receiver: PeerReceiver {
                peer,
                rx,
                service: self.inbox.clone(),
            },
        }
    }
}

/// Клиентское подключение.
#[derive(Debug)]
pub struct MemoryPeer {
    sender: PeerSender,
    receiver: PeerReceiver,
}

impl MemoryPeer {
    pub fn id(&self) -> PeerId {
        self.sender.peer
    }

    pub fn send(
        &self,
        msg: &UpstreamMessage,
    ) -> Result<(), DeliveryError> {
        self.sender.send(msg)
    }

    pub async fn recv(&mut self) -> Option<DownstreamMessage> {
        self.receiver.recv().await
    }

    /// Разделяет подключение на независимые половины для отправки и приёма.
    pub fn into_split(self) -> (PeerSender, PeerReceiver) {
        (self.sender, self.receiver)
    }
}

/// Отправляющая половина клиентского подключения.
#[derive(Debug, Clone)]
pub struct PeerSender {
    peer: PeerId,
    inbox: mpsc::UnboundedSender<Frame>,
    reply: mpsc::UnboundedSender<Bytes>,
}

impl PeerSender {
    pub fn id(&self) -> PeerId {
        self.peer
    }

    pub fn send(
        &self,
        msg: &UpstreamMessage,
    ) -> Result<(), DeliveryError> {
        let data = codec::encode(msg)?;
        self.send_raw(data)
    }

    /// Отправляет уже закодированный кадр как есть.
    pub fn send_raw(
        &self,
        data: Bytes,
    ) -> Result<(), DeliveryError> {
        let frame = Frame {
            peer: self.peer,
            data,
            reply: self.reply.clone(),
        };
        self.inbox.send(frame).map_err(|_| DeliveryError::Closed)
    }
}

/// Принимающая половина клиентского подключения.
///
/// Поток ответов заканчивается, когда сервисная точка удалена и все уже
/// доставленные кадры прочитаны.
#[derive(Debug)]
pub struct PeerReceiver {
    peer: PeerId,
    rx: mpsc::UnboundedReceiver<Bytes>,
    service: mpsc::UnboundedSender<Frame>,
}

impl PeerReceiver {
    pub fn id(&self) -> PeerId {
        self.peer
    }

    /// Ждёт следующее нисходящее сообщение. Нераспознанные кадры
    /// пропускаются.
    pub async fn recv(&mut self) -> Option<DownstreamMessage> {
        loop {
            let data = tokio::select! {
                biased;
                data = self.rx.recv() => data?,
                _ = self.service.closed() => self.rx.try_recv().ok()?,
            };
            match codec::decode::<DownstreamMessage>(&data) {
                Ok(msg) => return Some(msg),
                Err(e) => warn!(peer = %self.peer, error = %e, "Dropping undecodable reply"),
            }
        }
    }
}
