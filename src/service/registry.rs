use std::sync::Arc;

use dashmap::DashMap;

use super::{
    handler::{ObserveHook, RequestHandler},
    subscription::SubscriberSet,
};
use crate::transport::{PeerId, ReplyHandle};

/// Таблицы назначений сервиса.
///
/// Обработчики запросов и записи наблюдения независимы: одно и то же имя
/// может быть и тем, и другим. Набор подписчиков существует только для
/// назначений с записью наблюдения. Наружу guard'ы `DashMap` не выходят,
/// поэтому вызывающий код может спокойно ждать и вызывать пользовательский
/// код.
#[derive(Default)]
pub(crate) struct Registry {
    handlers: DashMap<String, Arc<dyn RequestHandler>>,
    observers: DashMap<String, Option<ObserveHook>>,
    subscriptions: DashMap<String, SubscriberSet>,
}

/// Запись наблюдения: хук, если он задан.
pub(crate) type Observer = Option<ObserveHook>;

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует обработчик. Возвращает `true`, если он заменил прежний.
    pub fn set_handler(
        &self,
        destination: &str,
        handler: Arc<dyn RequestHandler>,
    ) -> bool {
        self.handlers
            .insert(destination.to_string(), handler)
            .is_some()
    }

    pub fn handler(
        &self,
        destination: &str,
    ) -> Option<Arc<dyn RequestHandler>> {
        self.handlers.get(destination).map(|h| h.value().clone())
    }

    /// Регистрирует запись наблюдения. Существующие подписчики сохраняются.
    pub fn set_observer(
        &self,
        destination: &str,
        hook: Observer,
    ) -> bool {
        let replaced = self
            .observers
            .insert(destination.to_string(), hook)
            .is_some();
        self.subscriptions
            .entry(destination.to_string())
            .or_default();
        replaced
    }

    /// `None` — назначение не наблюдается; `Some(None)` — наблюдается без
    /// хука.
    pub fn observer(
        &self,
        destination: &str,
    ) -> Option<Observer> {
        self.observers.get(destination).map(|o| o.value().clone())
    }

    pub fn is_routable(
        &self,
        destination: &str,
    ) -> bool {
        self.handlers.contains_key(destination)
    }

    pub fn is_subscribable(
        &self,
        destination: &str,
    ) -> bool {
        self.observers.contains_key(destination)
    }

    /// Возвращает `true`, если отправитель подписался впервые.
    pub fn subscribe(
        &self,
        destination: &str,
        handle: ReplyHandle,
    ) -> bool {
        self.subscriptions
            .entry(destination.to_string())
            .or_default()
            .insert(handle)
    }

    /// Возвращает `true`, если отправитель был подписан.
    pub fn unsubscribe(
        &self,
        destination: &str,
        peer: PeerId,
    ) -> bool {
        self.subscriptions
            .get_mut(destination)
            .map(|mut set| set.remove(peer))
            .unwrap_or(false)
    }

    /// Снимок адресов подписчиков.
    pub fn recipients(
        &self,
        destination: &str,
    ) -> Vec<ReplyHandle> {
        self.subscriptions
            .get(destination)
            .map(|set| set.handles())
            .unwrap_or_default()
    }

    pub fn subscribers(
        &self,
        destination: &str,
    ) -> Vec<PeerId> {
        self.subscriptions
            .get(destination)
            .map(|set| set.peers())
            .unwrap_or_default()
    }

    pub fn subscriber_count(
        &self,
        destination: &str,
    ) -> usize {
        self.subscriptions
            .get(destination)
            .map(|set| set.len())
            .unwrap_or(0)
    }
}
