//! Генерация идентификаторов сообщений.
//!
//! Сервису идентификаторы нужны только для событий рассылки, клиенту — для
//! каждого запроса. Генератор внедряется снаружи, чтобы тесты могли
//! получать предсказуемые значения.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Источник уникальных идентификаторов.
pub trait IdGenerator: Send + Sync + 'static {
    fn next_id(&self) -> String;
}

/// Случайные UUID v4. Генератор по умолчанию.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Последовательные идентификаторы вида `{prefix}-{n}`, начиная с 1.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{n}", self.prefix)
    }
}
