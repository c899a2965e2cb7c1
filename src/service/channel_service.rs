use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use postbridge_error::StackError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, trace, warn};

use super::{
    handler::{AsyncFnHandler, FnHandler, ObserveHook, RequestHandler, TypedHandler},
    registry::Registry,
};
use crate::{
    config::ServiceConfig,
    ids::{IdGenerator, UuidGenerator},
    protocol::DownstreamMessage,
    transport::{Endpoint, PeerId},
};

/// Сервисная сторона протокола.
///
/// Держит таблицы назначений и набор подписчиков, разбирает входящие
/// сообщения и рассылает события. Сам задач не порождает: хост вызывает
/// [`ChannelService::run`] (обычно в `tokio::spawn`) или передаёт сообщения
/// напрямую через [`ChannelService::dispatch`].
pub struct ChannelService {
    pub(super) registry: Registry,
    pub(super) config: ServiceConfig,
    endpoint: Mutex<Box<dyn Endpoint>>,
    ids: Arc<dyn IdGenerator>,
    finished: AtomicBool,
    shutdown: watch::Sender<bool>,
}

/// Построитель сервиса с нестандартными настройками.
pub struct ChannelServiceBuilder {
    config: ServiceConfig,
    ids: Arc<dyn IdGenerator>,
}

impl Default for ChannelServiceBuilder {
    fn default() -> Self {
        Self {
            config: ServiceConfig::default(),
            ids: Arc::new(UuidGenerator),
        }
    }
}

impl ChannelServiceBuilder {
    pub fn config(
        mut self,
        config: ServiceConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Генератор `requestId` для событий рассылки.
    pub fn id_generator(
        mut self,
        ids: impl IdGenerator,
    ) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Привязывает сервис к транспорту.
    pub fn bind(
        self,
        endpoint: impl Endpoint,
    ) -> ChannelService {
        let (shutdown, _) = watch::channel(false);
        info!(
            service = %self.config.name,
            unroutable = ?self.config.unroutable,
            "Channel service bound"
        );
        ChannelService {
            registry: Registry::new(),
            config: self.config,
            endpoint: Mutex::new(Box::new(endpoint)),
            ids: self.ids,
            finished: AtomicBool::new(false),
            shutdown,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Регистрация
////////////////////////////////////////////////////////////////////////////////

impl ChannelService {
    /// Сервис с настройками по умолчанию.
    pub fn bind(endpoint: impl Endpoint) -> Self {
        Self::builder().bind(endpoint)
    }

    pub fn builder() -> ChannelServiceBuilder {
        ChannelServiceBuilder::default()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Регистрирует обработчик запросов. Прежний обработчик для того же
    /// назначения заменяется.
    pub fn listen_with(
        &self,
        destination: &str,
        handler: Arc<dyn RequestHandler>,
    ) {
        if self.registry.set_handler(destination, handler) {
            debug!(service = %self.config.name, destination, "Request handler replaced");
        } else {
            debug!(service = %self.config.name, destination, "Request handler registered");
        }
    }

    /// Синхронный обработчик.
    pub fn listen<F, E>(
        &self,
        destination: &str,
        handler: F,
    ) where
        F: Fn(Value) -> Result<Value, E> + Send + Sync + 'static,
        E: Into<StackError>,
    {
        self.listen_with(destination, Arc::new(FnHandler::new(handler)));
    }

    /// Асинхронный обработчик: ответ уходит после завершения future.
    pub fn listen_async<F, Fut, E>(
        &self,
        destination: &str,
        handler: F,
    ) where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
        E: Into<StackError> + Send + 'static,
    {
        self.listen_with(destination, Arc::new(AsyncFnHandler::new(handler)));
    }

    /// Обработчик с типизированными телами запроса и ответа.
    pub fn listen_typed<F, Req, Resp, E>(
        &self,
        destination: &str,
        handler: F,
    ) where
        F: Fn(Req) -> Result<Resp, E> + Send + Sync + 'static,
        Req: DeserializeOwned + 'static,
        Resp: Serialize + 'static,
        E: Into<StackError>,
    {
        self.listen_with(
            destination,
            Arc::new(TypedHandler::new(destination, handler)),
        );
    }

    /// Делает назначение доступным для подписки, без хука.
    pub fn observe(
        &self,
        destination: &str,
    ) {
        self.set_observer(destination, None);
    }

    /// Делает назначение доступным для подписки. `hook` вызывается при
    /// каждой подписке до того, как отправитель попадёт в набор; ошибка хука
    /// отклоняет подписку.
    pub fn observe_with<F, E>(
        &self,
        destination: &str,
        hook: F,
    ) where
        F: Fn() -> Result<(), E> + Send + Sync + 'static,
        E: Into<StackError>,
    {
        let wrapped: ObserveHook =
            Arc::new(move || -> Result<(), StackError> { hook().map_err(Into::into) });
        self.set_observer(destination, Some(wrapped));
    }

    fn set_observer(
        &self,
        destination: &str,
        hook: Option<ObserveHook>,
    ) {
        let with_hook = hook.is_some();
        let replaced = self.registry.set_observer(destination, hook);
        debug!(
            service = %self.config.name,
            destination,
            with_hook,
            replaced,
            "Destination observed"
        );
    }

    ////////////////////////////////////////////////////////////////////////////
    // Цикл приёма и рассылка
    ////////////////////////////////////////////////////////////////////////////

    /// Принимает сообщения транспорта, пока не будет вызван
    /// [`ChannelService::finish`] или транспорт не закроется.
    ///
    /// Второй одновременный вызов сразу возвращается.
    pub async fn run(&self) {
        let mut endpoint = match self.endpoint.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(service = %self.config.name, "Channel service is already running");
                return;
            }
        };
        let mut shutdown = self.shutdown.subscribe();
        if self.is_finished() {
            return;
        }

        info!(service = %self.config.name, "Channel service listening");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    debug!(service = %self.config.name, "Listener detached");
                    break;
                }
                inbound = endpoint.recv() => match inbound {
                    Some(inbound) => {
                        self.dispatch(inbound).await;
                    }
                    None => {
                        info!(service = %self.config.name, "Transport closed");
                        break;
                    }
                },
            }
        }
    }

    /// Рассылает событие всем текущим подписчикам назначения.
    ///
    /// Все получатели видят один и тот же свежий `requestId`. Ошибка доставки
    /// одному подписчику не мешает остальным. Возвращает число успешных
    /// отправок.
    pub fn broadcast(
        &self,
        destination: &str,
        payload: Value,
    ) -> usize {
        let recipients = self.registry.recipients(destination);
        if recipients.is_empty() {
            trace!(service = %self.config.name, destination, "Broadcast without subscribers");
            return 0;
        }

        let event = DownstreamMessage::event(self.ids.next_id(), destination, payload);
        let mut delivered = 0;
        for recipient in &recipients {
            match recipient.post(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(
                    service = %self.config.name,
                    destination,
                    peer = %recipient.peer_id(),
                    error = %e,
                    "Event delivery failed"
                ),
            }
        }

        trace!(
            service = %self.config.name,
            destination,
            request_id = %event.request_id,
            delivered,
            total = recipients.len(),
            "Event broadcast"
        );
        delivered
    }

    /// Отключает сервис от входящих сообщений. Идемпотентно.
    ///
    /// Уже начатая обработка доводится до конца; таблицы и подписчики не
    /// очищаются.
    pub fn finish(&self) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.send_replace(true);
        info!(service = %self.config.name, "Channel service finished");
    }

    ////////////////////////////////////////////////////////////////////////////
    // Состояние
    ////////////////////////////////////////////////////////////////////////////

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn is_routable(
        &self,
        destination: &str,
    ) -> bool {
        self.registry.is_routable(destination)
    }

    pub fn is_subscribable(
        &self,
        destination: &str,
    ) -> bool {
        self.registry.is_subscribable(destination)
    }

    pub fn subscriber_count(
        &self,
        destination: &str,
    ) -> usize {
        self.registry.subscriber_count(destination)
    }

    pub fn subscribers(
        &self,
        destination: &str,
    ) -> Vec<PeerId> {
        self.registry.subscribers(destination)
    }
}

impl std::fmt::Debug for ChannelService {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ChannelService")
            .field("config", &self.config)
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}
