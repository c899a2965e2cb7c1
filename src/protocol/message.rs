use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_repr::{Deserialize_repr, Serialize_repr};

use super::ErrorPayload;

/// Описание отказа при ошибке обработчика запроса.
pub const REQUEST_FAILED: &str = "Channel service handle request failed";
/// Описание отказа при ошибке хука подписки.
pub const SUBSCRIBE_FAILED: &str = "Channel service handle subscribe failed";
/// Описание ответа на сообщение без зарегистрированного получателя.
pub const DESTINATION_NOT_FOUND: &str = "Channel service destination not found";

/// Тип восходящего сообщения (клиент → сервис).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamKind {
    Request,
    Subscribe,
    Unsubscribe,
}

/// Тип нисходящего сообщения (сервис → клиент).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownstreamKind {
    Response,
    Ack,
    Event,
}

/// Статус нисходящего сообщения. На проводе — число.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u16)]
pub enum Status {
    Ok = 200,
    BadRequest = 400,
    NotFound = 404,
}

impl Status {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    /// Приводит внутренний код ошибки к статусу на проводе.
    pub fn from_error_code(code: postbridge_error::StatusCode) -> Self {
        match code.wire_status() {
            200 => Status::Ok,
            404 => Status::NotFound,
            _ => Status::BadRequest,
        }
    }
}

/// Сообщение, которое клиент отправляет сервису.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamMessage {
    pub kind: UpstreamKind,
    pub request_id: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl UpstreamMessage {
    pub fn request(
        request_id: impl Into<String>,
        destination: impl Into<String>,
        body: Value,
    ) -> Self {
        Self {
            kind: UpstreamKind::Request,
            request_id: request_id.into(),
            destination: destination.into(),
            body: Some(body),
        }
    }

    pub fn subscribe(
        request_id: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            kind: UpstreamKind::Subscribe,
            request_id: request_id.into(),
            destination: destination.into(),
            body: None,
        }
    }

    pub fn unsubscribe(
        request_id: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            kind: UpstreamKind::Unsubscribe,
            request_id: request_id.into(),
            destination: destination.into(),
            body: None,
        }
    }
}

/// Сообщение, которое сервис отправляет клиенту.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownstreamMessage {
    pub kind: DownstreamKind,
    pub request_id: String,
    pub destination: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DownstreamMessage {
    /// Успешный ответ на запрос.
    pub fn response(
        request: &UpstreamMessage,
        body: Value,
    ) -> Self {
        Self {
            kind: DownstreamKind::Response,
            request_id: request.request_id.clone(),
            destination: request.destination.clone(),
            status: Status::Ok,
            body: Some(body),
            description: None,
        }
    }

    /// Успешное подтверждение подписки или отписки.
    pub fn ack(request: &UpstreamMessage) -> Self {
        Self {
            kind: DownstreamKind::Ack,
            request_id: request.request_id.clone(),
            destination: request.destination.clone(),
            status: Status::Ok,
            body: None,
            description: None,
        }
    }

    /// Событие рассылки. `request_id` генерируется заново для каждой
    /// рассылки.
    pub fn event(
        request_id: impl Into<String>,
        destination: impl Into<String>,
        body: Value,
    ) -> Self {
        Self {
            kind: DownstreamKind::Event,
            request_id: request_id.into(),
            destination: destination.into(),
            status: Status::Ok,
            body: Some(body),
            description: None,
        }
    }

    /// Отказ того же вида, что и успешный ответ на `request`.
    ///
    /// Для запросов это `response`, для подписки и отписки — `ack`.
    pub fn failed(
        request: &UpstreamMessage,
        status: Status,
        error: ErrorPayload,
        description: &str,
    ) -> Self {
        let kind = match request.kind {
            UpstreamKind::Request => DownstreamKind::Response,
            UpstreamKind::Subscribe | UpstreamKind::Unsubscribe => DownstreamKind::Ack,
        };
        Self {
            kind,
            request_id: request.request_id.clone(),
            destination: request.destination.clone(),
            status,
            body: Some(error.into_value()),
            description: Some(description.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Разбирает тело отказа, если оно соответствует схеме [`ErrorPayload`].
    pub fn error_payload(&self) -> Option<ErrorPayload> {
        if self.is_ok() {
            return None;
        }
        self.body
            .as_ref()
            .and_then(|b| serde_json::from_value(b.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Тест проверяет имена полей и значения на проводе.
    #[test]
    fn test_upstream_wire_shape() {
        let msg = UpstreamMessage::request("r1", "add", json!({"a": 2, "b": 3}));
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            v,
            json!({"kind": "request", "requestId": "r1", "destination": "add", "body": {"a": 2, "b": 3}})
        );

        let sub = UpstreamMessage::subscribe("s1", "ticks");
        let v = serde_json::to_value(&sub).unwrap();
        assert_eq!(
            v,
            json!({"kind": "subscribe", "requestId": "s1", "destination": "ticks"})
        );
    }

    /// Тест проверяет, что статус сериализуется числом.
    #[test]
    fn test_downstream_status_is_numeric() {
        let req = UpstreamMessage::request("r1", "add", json!(null));
        let resp = DownstreamMessage::response(&req, json!(5));
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            v,
            json!({"kind": "response", "requestId": "r1", "destination": "add", "status": 200, "body": 5})
        );
    }

    #[test]
    fn test_upstream_body_is_optional_on_input() {
        let raw = json!({"kind": "unsubscribe", "requestId": "u1", "destination": "ticks"});
        let msg: UpstreamMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.kind, UpstreamKind::Unsubscribe);
        assert!(msg.body.is_none());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let raw = json!({"kind": "publish", "requestId": "p1", "destination": "x"});
        assert!(serde_json::from_value::<UpstreamMessage>(raw).is_err());
    }

    /// Тест проверяет, что отказ на подписку — это `ack`, а не `response`.
    #[test]
    fn test_failed_kind_follows_request_kind() {
        let payload = ErrorPayload::new("hook_failed", "feed offline");
        let sub = UpstreamMessage::subscribe("s1", "ticks");
        let msg = DownstreamMessage::failed(&sub, Status::BadRequest, payload.clone(), SUBSCRIBE_FAILED);
        assert_eq!(msg.kind, DownstreamKind::Ack);
        assert_eq!(msg.status.code(), 400);
        assert_eq!(msg.description.as_deref(), Some(SUBSCRIBE_FAILED));
        assert_eq!(msg.error_payload(), Some(payload));

        let req = UpstreamMessage::request("r1", "add", json!({}));
        let msg = DownstreamMessage::failed(
            &req,
            Status::BadRequest,
            ErrorPayload::new("x", "y"),
            REQUEST_FAILED,
        );
        assert_eq!(msg.kind, DownstreamKind::Response);
    }

    #[test]
    fn test_status_from_error_code() {
        use postbridge_error::StatusCode;
        assert_eq!(Status::from_error_code(StatusCode::NotFound), Status::NotFound);
        assert_eq!(
            Status::from_error_code(StatusCode::HandlerFailed),
            Status::BadRequest
        );
    }
}
