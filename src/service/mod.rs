//! Сервисная сторона протокола: регистрация назначений, разбор входящих
//! сообщений и рассылка событий подписчикам.

mod channel_service;
mod dispatch;
pub mod handler;
mod registry;
pub mod subscription;

pub use channel_service::{ChannelService, ChannelServiceBuilder};
pub use futures::future::BoxFuture;
pub use handler::{
    AsyncFnHandler, FnHandler, HandlerResult, ObserveHook, RequestHandler, TypedHandler,
};
pub use subscription::SubscriberSet;
