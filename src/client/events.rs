use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// Событие рассылки, полученное клиентом.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub request_id: String,
    pub destination: String,
    pub body: Value,
}

impl Event {
    /// Разбирает тело события в нужный тип.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body.clone())
    }
}

/// Поток событий одной подписки.
///
/// Заканчивается (`recv` возвращает `None`) после отписки или закрытия
/// транспорта.
#[derive(Debug)]
pub struct EventStream {
    destination: String,
    rx: broadcast::Receiver<Event>,
}

impl EventStream {
    pub(crate) fn new(
        destination: String,
        rx: broadcast::Receiver<Event>,
    ) -> Self {
        Self { destination, rx }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Ждёт следующее событие. Если читатель отстал и буфер переполнился,
    /// пропущенные события теряются с предупреждением в логе.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(destination = %self.destination, skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Неблокирующая проверка: событие, если оно уже пришло.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(destination = %self.destination, skipped, "Event stream lagged");
                }
                Err(_) => return None,
            }
        }
    }
}
