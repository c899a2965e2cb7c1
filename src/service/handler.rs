//! Обработчики запросов и хуки подписки.
//!
//! Обработчик может вернуть результат сразу или позже: сервис в любом случае
//! дожидается его, прежде чем ответить. Ошибки и паники обработчика
//! перехватываются здесь и никогда не выходят за пределы диспетчера.

use std::{
    any::Any,
    future::Future,
    marker::PhantomData,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use futures::{
    future::{self, BoxFuture},
    FutureExt,
};
use postbridge_error::{ChannelError, StackError, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Результат обработчика: тело ответа или ошибка.
pub type HandlerResult = Result<Value, StackError>;

/// Хук, вызываемый при каждой успешной подписке.
pub type ObserveHook = Arc<dyn Fn() -> Result<(), StackError> + Send + Sync>;

/// Обработчик запросов для одного назначения.
pub trait RequestHandler: Send + Sync + 'static {
    fn call(
        &self,
        body: Value,
    ) -> BoxFuture<'static, HandlerResult>;
}

/// Синхронный обработчик из замыкания.
pub struct FnHandler<F>(F);

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F, E> RequestHandler for FnHandler<F>
where
    F: Fn(Value) -> Result<Value, E> + Send + Sync + 'static,
    E: Into<StackError>,
{
    fn call(
        &self,
        body: Value,
    ) -> BoxFuture<'static, HandlerResult> {
        let result: HandlerResult = (self.0)(body).map_err(Into::<StackError>::into);
        future::ready(result).boxed()
    }
}

/// Асинхронный обработчик из замыкания, возвращающего future.
pub struct AsyncFnHandler<F>(F);

impl<F> AsyncFnHandler<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F, Fut, E> RequestHandler for AsyncFnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, E>> + Send + 'static,
    E: Into<StackError> + Send + 'static,
{
    fn call(
        &self,
        body: Value,
    ) -> BoxFuture<'static, HandlerResult> {
        let fut = (self.0)(body);
        async move { fut.await.map_err(Into::<StackError>::into) }.boxed()
    }
}

/// Обработчик с типизированными запросом и ответом.
///
/// Тело, которое не удаётся разобрать в `Req`, превращается в отказ с
/// кодом `InvalidData`; сам обработчик при этом не вызывается.
pub struct TypedHandler<F, Req, Resp> {
    destination: String,
    f: F,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<F, Req, Resp> TypedHandler<F, Req, Resp> {
    pub fn new(
        destination: impl Into<String>,
        f: F,
    ) -> Self {
        Self {
            destination: destination.into(),
            f,
            _marker: PhantomData,
        }
    }
}

impl<F, Req, Resp, E> RequestHandler for TypedHandler<F, Req, Resp>
where
    F: Fn(Req) -> Result<Resp, E> + Send + Sync + 'static,
    Req: DeserializeOwned + 'static,
    Resp: Serialize + 'static,
    E: Into<StackError>,
{
    fn call(
        &self,
        body: Value,
    ) -> BoxFuture<'static, HandlerResult> {
        let result: HandlerResult = serde_json::from_value::<Req>(body)
            .map_err(|e| {
                StackError::new(ChannelError::InvalidBody {
                    destination: self.destination.clone(),
                    reason: e.to_string(),
                })
            })
            .and_then(|req| (self.f)(req).map_err(Into::<StackError>::into))
            .and_then(|resp| {
                serde_json::to_value(resp)
                    .map_err(|e| StackError::msg(StatusCode::EncodingError, e.to_string()))
            });
        future::ready(result).boxed()
    }
}

/// Вызывает обработчик, перехватывая паники и при вызове, и при опросе
/// future. `Err` содержит текст паники.
pub(crate) async fn invoke(
    handler: &dyn RequestHandler,
    body: Value,
) -> Result<HandlerResult, String> {
    AssertUnwindSafe(async move { handler.call(body).await })
        .catch_unwind()
        .await
        .map_err(panic_message)
}

/// Вызывает хук подписки, перехватывая паники.
pub(crate) fn invoke_hook(
    destination: &str,
    hook: &ObserveHook,
) -> Result<(), StackError> {
    match panic::catch_unwind(AssertUnwindSafe(|| hook())) {
        Ok(result) => result,
        Err(payload) => Err(StackError::new(ChannelError::HookPanicked {
            destination: destination.to_string(),
            message: panic_message(payload),
        })),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Deserialize)]
    struct Add {
        a: i64,
        b: i64,
    }

    #[tokio::test]
    async fn test_fn_handler() {
        let h = FnHandler::new(|body: Value| -> Result<Value, StackError> {
            Ok(json!(body["a"].as_i64().unwrap_or(0) * 2))
        });
        let out = invoke(&h, json!({"a": 21})).await.unwrap().unwrap();
        assert_eq!(out, json!(42));
    }

    /// Тест проверяет, что асинхронный обработчик дожидается результата.
    #[tokio::test]
    async fn test_async_handler_is_awaited() {
        let h = AsyncFnHandler::new(|body: Value| async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok::<_, StackError>(body)
        });
        let out = invoke(&h, json!("later")).await.unwrap().unwrap();
        assert_eq!(out, json!("later"));
    }

    #[tokio::test]
    async fn test_typed_handler_ok_and_invalid_body() {
        let h = TypedHandler::<_, Add, i64>::new("add", |req: Add| Ok::<_, StackError>(req.a + req.b));
        let out = invoke(&h, json!({"a": 2, "b": 3})).await.unwrap().unwrap();
        assert_eq!(out, json!(5));

        let err = invoke(&h, json!({"a": 2})).await.unwrap().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidData);
    }

    /// Тест проверяет перехват паники в синхронном обработчике.
    #[tokio::test]
    async fn test_sync_panic_is_caught() {
        let h = FnHandler::new(|_: Value| -> Result<Value, StackError> { panic!("boom") });
        let err = invoke(&h, Value::Null).await.unwrap_err();
        assert_eq!(err, "boom");
    }

    /// Тест проверяет перехват паники внутри future.
    #[tokio::test]
    async fn test_async_panic_is_caught() {
        let h = AsyncFnHandler::new(|_: Value| async move {
            tokio::task::yield_now().await;
            if true {
                panic!("{}", String::from("late boom"));
            }
            Ok::<_, StackError>(Value::Null)
        });
        let err = invoke(&h, Value::Null).await.unwrap_err();
        assert_eq!(err, "late boom");
    }

    #[test]
    fn test_hook_errors_and_panics() {
        let ok: ObserveHook = Arc::new(|| -> Result<(), StackError> { Ok(()) });
        assert!(invoke_hook("ticks", &ok).is_ok());

        let failing: ObserveHook =
            Arc::new(|| -> Result<(), StackError> { Err("feed offline".into()) });
        assert_eq!(
            invoke_hook("ticks", &failing).unwrap_err().client_message(),
            "feed offline"
        );

        let panicking: ObserveHook = Arc::new(|| -> Result<(), StackError> { panic!("kaboom") });
        let err = invoke_hook("ticks", &panicking).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::HookFailed);
        assert!(err.to_string().contains("kaboom"));
        assert!(!err.client_message().contains("kaboom"));
    }
}
