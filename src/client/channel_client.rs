use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::{
    sync::{broadcast, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, trace};

use super::events::{Event, EventStream};
use crate::{
    config::ClientConfig,
    error::{ClientError, ClientResult},
    ids::{IdGenerator, UuidGenerator},
    protocol::{DownstreamKind, DownstreamMessage, ErrorPayload, UpstreamMessage},
    transport::{
        memory::{MemoryConnector, MemoryPeer, PeerReceiver, PeerSender},
        PeerId,
    },
};

/// Состояние, общее для клиента и задачи чтения ответов.
#[derive(Default)]
struct Shared {
    pending: DashMap<String, oneshot::Sender<DownstreamMessage>>,
    events: DashMap<String, broadcast::Sender<Event>>,
    closed: AtomicBool,
}

impl Shared {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // Ожидающие запросы получат ошибку канала, потоки событий закончатся.
        self.pending.clear();
        self.events.clear();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Клиент канала.
///
/// Задача чтения ответов запускается через `tokio::spawn` при создании и
/// останавливается при удалении клиента.
pub struct ChannelClient {
    sender: PeerSender,
    shared: Arc<Shared>,
    config: ClientConfig,
    ids: Arc<dyn IdGenerator>,
    reader: JoinHandle<()>,
}

/// Удаляет запись ожидания, если запрос завершился или был отменён.
struct PendingGuard<'a> {
    shared: &'a Shared,
    request_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.pending.remove(self.request_id);
    }
}

impl ChannelClient {
    /// Открывает новое подключение к сервису.
    ///
    /// # Panics
    ///
    /// Вне контекста рантайма tokio.
    pub fn connect(
        connector: &MemoryConnector,
        config: ClientConfig,
    ) -> Self {
        Self::from_peer(connector.connect(), config)
    }

    pub fn from_peer(
        peer: MemoryPeer,
        config: ClientConfig,
    ) -> Self {
        let (sender, receiver) = peer.into_split();
        let shared = Arc::new(Shared::default());
        let reader = tokio::spawn(read_loop(receiver, shared.clone()));
        info!(peer = %sender.id(), timeout_ms = config.request_timeout_ms, "Channel client connected");
        Self {
            sender,
            shared,
            config,
            ids: Arc::new(UuidGenerator),
            reader,
        }
    }

    /// Генератор `requestId` для исходящих сообщений.
    pub fn with_id_generator(
        mut self,
        ids: impl IdGenerator,
    ) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn peer_id(&self) -> PeerId {
        self.sender.id()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Запрос с произвольным JSON-телом. Возвращает тело ответа.
    pub async fn request(
        &self,
        destination: &str,
        body: Value,
    ) -> ClientResult<Value> {
        let msg = UpstreamMessage::request(self.ids.next_id(), destination, body);
        let reply = self.round_trip(msg).await?;
        Ok(reply.body.unwrap_or(Value::Null))
    }

    /// Запрос с типизированными телами.
    pub async fn request_typed<Req, Resp>(
        &self,
        destination: &str,
        body: &Req,
    ) -> ClientResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let value = serde_json::to_value(body)?;
        let reply = self.request(destination, value).await?;
        Ok(serde_json::from_value(reply)?)
    }

    /// Подписывается на назначение.
    ///
    /// Поток создаётся до отправки подписки, поэтому события, отправленные
    /// сразу после подтверждения, не теряются. Несколько потоков на одно
    /// назначение получают одни и те же события.
    pub async fn subscribe(
        &self,
        destination: &str,
    ) -> ClientResult<EventStream> {
        let rx = self
            .shared
            .events
            .entry(destination.to_string())
            .or_insert_with(|| broadcast::channel(self.config.event_capacity.max(1)).0)
            .subscribe();

        let msg = UpstreamMessage::subscribe(self.ids.next_id(), destination);
        if let Err(err) = self.round_trip(msg).await {
            drop(rx);
            // Канал событий остаётся, только если его слушает другой поток.
            self.shared
                .events
                .remove_if(destination, |_, tx| tx.receiver_count() == 0);
            return Err(err);
        }
        debug!(peer = %self.peer_id(), destination, "Subscribed");
        Ok(EventStream::new(destination.to_string(), rx))
    }

    /// Отписывается. После подтверждения все потоки этого назначения
    /// заканчиваются.
    pub async fn unsubscribe(
        &self,
        destination: &str,
    ) -> ClientResult<()> {
        let msg = UpstreamMessage::unsubscribe(self.ids.next_id(), destination);
        self.round_trip(msg).await?;
        self.shared.events.remove(destination);
        debug!(peer = %self.peer_id(), destination, "Unsubscribed");
        Ok(())
    }

    async fn round_trip(
        &self,
        msg: UpstreamMessage,
    ) -> ClientResult<DownstreamMessage> {
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(msg.request_id.clone(), tx);
        let _guard = PendingGuard {
            shared: &self.shared,
            request_id: &msg.request_id,
        };
        if self.shared.is_closed() {
            return Err(ClientError::Closed);
        }

        self.sender.send(&msg)?;
        trace!(
            peer = %self.peer_id(),
            kind = ?msg.kind,
            request_id = %msg.request_id,
            destination = %msg.destination,
            "Message sent"
        );

        let reply = match tokio::time::timeout(self.config.request_timeout(), rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(ClientError::Closed),
            Err(_) => {
                return Err(ClientError::Timeout {
                    destination: msg.destination.clone(),
                    request_id: msg.request_id.clone(),
                    timeout_ms: self.config.request_timeout_ms,
                })
            }
        };

        if reply.is_ok() {
            return Ok(reply);
        }
        let error = reply.error_payload().unwrap_or_else(|| {
            ErrorPayload::new(
                "unknown",
                reply.description.clone().unwrap_or_default(),
            )
        });
        Err(ClientError::Rejected {
            destination: reply.destination,
            status: reply.status,
            error,
            description: reply.description,
        })
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for ChannelClient {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ChannelClient")
            .field("peer", &self.peer_id())
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Раскладывает входящие сообщения: ответы — ожидающим запросам, события —
/// в потоки подписок.
async fn read_loop(
    mut receiver: PeerReceiver,
    shared: Arc<Shared>,
) {
    while let Some(msg) = receiver.recv().await {
        match msg.kind {
            DownstreamKind::Event => {
                let sender = shared.events.get(&msg.destination).map(|s| s.value().clone());
                match sender {
                    Some(tx) => {
                        let _ = tx.send(Event {
                            request_id: msg.request_id,
                            destination: msg.destination,
                            body: msg.body.unwrap_or(Value::Null),
                        });
                    }
                    None => trace!(
                        peer = %receiver.id(),
                        destination = %msg.destination,
                        "Event without local subscription"
                    ),
                }
            }
            DownstreamKind::Response | DownstreamKind::Ack => {
                match shared.pending.remove(&msg.request_id) {
                    Some((_, tx)) => {
                        let _ = tx.send(msg);
                    }
                    None => debug!(
                        peer = %receiver.id(),
                        request_id = %msg.request_id,
                        "Reply without pending request"
                    ),
                }
            }
        }
    }

    debug!(peer = %receiver.id(), "Reply stream closed");
    shared.close();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{
        ids::SequentialIds,
        protocol::{Status, UpstreamKind},
        transport::{memory, Endpoint},
    };

    fn fast() -> ClientConfig {
        ClientConfig::default().with_request_timeout_ms(50)
    }

    /// Тест проверяет сопоставление ответа запросу без сервиса: ответ
    /// формируется вручную на сервисной стороне транспорта.
    #[tokio::test]
    async fn test_request_matches_reply_by_id() {
        let (mut endpoint, connector) = memory::channel();
        let client = ChannelClient::connect(&connector, fast()).with_id_generator(SequentialIds::new("c"));

        let server = tokio::spawn(async move {
            let inbound = endpoint.recv().await.unwrap();
            assert_eq!(inbound.message.kind, UpstreamKind::Request);
            assert_eq!(inbound.message.request_id, "c-1");
            // Чужой ответ должен быть проигнорирован.
            let mut stray = inbound.message.clone();
            stray.request_id = "other".to_string();
            inbound
                .reply_to
                .post(DownstreamMessage::response(&stray, json!("wrong")))
                .unwrap();
            inbound
                .reply_to
                .post(DownstreamMessage::response(&inbound.message, json!("right")))
                .unwrap();
            endpoint
        });

        let body = client.request("echo", json!(1)).await.unwrap();
        assert_eq!(body, json!("right"));
        let _endpoint = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_times_out() {
        let (_endpoint, connector) = memory::channel();
        let client = ChannelClient::connect(&connector, fast());

        let err = client.request("nope", json!(1)).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { timeout_ms: 50, .. }));
        assert!(client.shared.pending.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_is_surfaced() {
        let (mut endpoint, connector) = memory::channel();
        let client = ChannelClient::connect(&connector, fast());

        tokio::spawn(async move {
            let inbound = endpoint.recv().await.unwrap();
            let reply = DownstreamMessage::failed(
                &inbound.message,
                Status::BadRequest,
                ErrorPayload::new("handler_failed", "division by zero"),
                crate::protocol::REQUEST_FAILED,
            );
            inbound.reply_to.post(reply).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        match client.request("div", json!({"a": 1, "b": 0})).await {
            Err(ClientError::Rejected { status, error, .. }) => {
                assert_eq!(status, Status::BadRequest);
                assert_eq!(error.message, "division by zero");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    /// Тест проверяет, что отклонённая подписка не оставляет канал событий,
    /// а живой поток того же назначения его сохраняет.
    #[tokio::test]
    async fn test_failed_subscribe_leaves_no_event_channel() {
        let (mut endpoint, connector) = memory::channel();
        let client = ChannelClient::connect(&connector, fast());

        tokio::spawn(async move {
            let first = endpoint.recv().await.unwrap();
            first
                .reply_to
                .post(DownstreamMessage::ack(&first.message))
                .unwrap();
            while let Some(inbound) = endpoint.recv().await {
                let reply = DownstreamMessage::failed(
                    &inbound.message,
                    Status::BadRequest,
                    ErrorPayload::new("hook_failed", "feed offline"),
                    crate::protocol::SUBSCRIBE_FAILED,
                );
                inbound.reply_to.post(reply).unwrap();
            }
        });

        let _prices = client.subscribe("prices").await.unwrap();

        let err = client.subscribe("ticks").await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected { .. }));
        assert!(!client.shared.events.contains_key("ticks"));

        let err = client.subscribe("prices").await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected { .. }));
        assert!(client.shared.events.contains_key("prices"));
        assert_eq!(client.shared.events.len(), 1);
    }

    #[tokio::test]
    async fn test_timed_out_subscribe_leaves_no_event_channel() {
        let (_endpoint, connector) = memory::channel();
        let client = ChannelClient::connect(&connector, fast());

        let err = client.subscribe("ticks").await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { .. }));
        assert!(client.shared.events.is_empty());
    }

    /// Тест проверяет, что удаление сервисной стороны завершает ожидающий
    /// запрос ошибкой `Closed`, а не таймаутом.
    #[tokio::test]
    async fn test_service_gone_fails_pending_request_with_closed() {
        let (mut endpoint, connector) = memory::channel();
        let client = ChannelClient::connect(
            &connector,
            ClientConfig::default().with_request_timeout_ms(5_000),
        );

        tokio::spawn(async move {
            let inbound = endpoint.recv().await.unwrap();
            drop(inbound);
            drop(endpoint);
        });

        let err = client.request("echo", json!(1)).await.unwrap_err();
        assert!(matches!(err, ClientError::Closed), "got {err:?}");
        assert!(client.is_closed());
        assert!(client.shared.pending.is_empty());

        let err = client.request("echo", json!(2)).await.unwrap_err();
        assert!(matches!(err, ClientError::Closed));
    }

    /// Тест проверяет, что закрытие транспорта завершает ожидание ошибкой
    /// `Closed`, а не таймаутом.
    #[tokio::test]
    async fn test_closed_transport() {
        let (endpoint, connector) = memory::channel();
        let client = ChannelClient::connect(
            &connector,
            ClientConfig::default().with_request_timeout_ms(5_000),
        );
        drop(endpoint);

        let err = client.request("echo", json!(1)).await.unwrap_err();
        assert!(matches!(err, ClientError::Send(_) | ClientError::Closed));
    }
}
