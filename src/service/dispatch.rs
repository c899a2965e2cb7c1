//! Разбор одного входящего сообщения.
//!
//! | kind          | назначение найдено             | не найдено         |
//! |---------------|--------------------------------|--------------------|
//! | `request`     | `response` 200 или 400         | тишина или 404     |
//! | `subscribe`   | хук, затем `ack` 200 или 400   | тишина или 404     |
//! | `unsubscribe` | `ack` 200, даже без подписки   | тишина или 404     |
//!
//! Поведение для ненайденного назначения задаётся
//! [`UnroutablePolicy`](crate::config::UnroutablePolicy).

use std::sync::Arc;

use postbridge_error::{ChannelError, StackError};
use serde_json::Value;
use tracing::{debug, error, trace, warn};

use super::{
    handler::{invoke, invoke_hook, RequestHandler},
    registry::Observer,
    ChannelService,
};
use crate::{
    config::UnroutablePolicy,
    protocol::{
        DownstreamMessage, ErrorPayload, Status, UpstreamKind, UpstreamMessage,
        DESTINATION_NOT_FOUND, REQUEST_FAILED, SUBSCRIBE_FAILED,
    },
    transport::{Inbound, ReplyHandle},
};

impl ChannelService {
    /// Обрабатывает одно входящее сообщение и отправляет ответ по его
    /// обратному адресу.
    ///
    /// Возвращает отправленный ответ или `None`, если ответа не было:
    /// сервис остановлен или назначение не найдено при политике `Drop`.
    /// Ошибка доставки ответа только логируется.
    pub async fn dispatch(
        &self,
        inbound: Inbound,
    ) -> Option<DownstreamMessage> {
        if self.is_finished() {
            trace!(
                service = %self.config.name,
                request_id = %inbound.message.request_id,
                "Ignoring message after finish"
            );
            return None;
        }

        let Inbound { message, reply_to } = inbound;
        trace!(
            service = %self.config.name,
            kind = ?message.kind,
            request_id = %message.request_id,
            destination = %message.destination,
            peer = %reply_to.peer_id(),
            "Dispatching message"
        );

        let reply = match message.kind {
            UpstreamKind::Request => match self.registry.handler(&message.destination) {
                Some(handler) => Some(self.handle_request(&message, handler).await),
                None => self.unroutable(&message),
            },
            UpstreamKind::Subscribe => match self.registry.observer(&message.destination) {
                Some(observer) => Some(self.handle_subscribe(&message, observer, &reply_to)),
                None => self.unroutable(&message),
            },
            UpstreamKind::Unsubscribe => {
                if self.registry.is_subscribable(&message.destination) {
                    Some(self.handle_unsubscribe(&message, &reply_to))
                } else {
                    self.unroutable(&message)
                }
            }
        }?;

        if let Err(e) = reply_to.post(reply.clone()) {
            debug!(
                service = %self.config.name,
                request_id = %reply.request_id,
                peer = %reply_to.peer_id(),
                error = %e,
                "Reply delivery failed"
            );
        }
        Some(reply)
    }

    async fn handle_request(
        &self,
        request: &UpstreamMessage,
        handler: Arc<dyn RequestHandler>,
    ) -> DownstreamMessage {
        let body = request.body.clone().unwrap_or(Value::Null);
        let result = match invoke(&*handler, body).await {
            Ok(result) => result,
            Err(panic) => Err(StackError::new(ChannelError::HandlerPanicked {
                destination: request.destination.clone(),
                message: panic,
            })),
        };

        match result {
            Ok(body) => DownstreamMessage::response(request, body),
            Err(err) => {
                self.log_failure(request, &err, REQUEST_FAILED);
                DownstreamMessage::failed(
                    request,
                    Status::BadRequest,
                    ErrorPayload::from(&err),
                    REQUEST_FAILED,
                )
            }
        }
    }

    fn handle_subscribe(
        &self,
        request: &UpstreamMessage,
        observer: Observer,
        reply_to: &ReplyHandle,
    ) -> DownstreamMessage {
        if let Some(hook) = observer {
            if let Err(err) = invoke_hook(&request.destination, &hook) {
                self.log_failure(request, &err, SUBSCRIBE_FAILED);
                return DownstreamMessage::failed(
                    request,
                    Status::BadRequest,
                    ErrorPayload::from(&err),
                    SUBSCRIBE_FAILED,
                );
            }
        }

        let added = self
            .registry
            .subscribe(&request.destination, reply_to.clone());
        debug!(
            service = %self.config.name,
            destination = %request.destination,
            peer = %reply_to.peer_id(),
            added,
            "Subscriber registered"
        );
        DownstreamMessage::ack(request)
    }

    fn handle_unsubscribe(
        &self,
        request: &UpstreamMessage,
        reply_to: &ReplyHandle,
    ) -> DownstreamMessage {
        let removed = self
            .registry
            .unsubscribe(&request.destination, reply_to.peer_id());
        debug!(
            service = %self.config.name,
            destination = %request.destination,
            peer = %reply_to.peer_id(),
            removed,
            "Subscriber removed"
        );
        DownstreamMessage::ack(request)
    }

    fn unroutable(
        &self,
        request: &UpstreamMessage,
    ) -> Option<DownstreamMessage> {
        match self.config.unroutable {
            UnroutablePolicy::Drop => {
                debug!(
                    service = %self.config.name,
                    kind = ?request.kind,
                    destination = %request.destination,
                    "Dropping message for unknown destination"
                );
                None
            }
            UnroutablePolicy::Reject => {
                let err = StackError::new(ChannelError::Unroutable {
                    destination: request.destination.clone(),
                });
                Some(DownstreamMessage::failed(
                    request,
                    Status::from_error_code(err.status_code()),
                    ErrorPayload::from(&err),
                    DESTINATION_NOT_FOUND,
                ))
            }
        }
    }

    fn log_failure(
        &self,
        request: &UpstreamMessage,
        err: &StackError,
        description: &str,
    ) {
        if err.is_critical() {
            error!(
                service = %self.config.name,
                request_id = %request.request_id,
                destination = %request.destination,
                status_code = %err.status_code(),
                error = %err.root().log_message(),
                "{description}"
            );
        } else {
            warn!(
                service = %self.config.name,
                request_id = %request.request_id,
                destination = %request.destination,
                status_code = %err.status_code(),
                error = %err,
                "{description}"
            );
        }
    }
}
