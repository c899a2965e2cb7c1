use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;

/// Что делать с сообщением, для назначения которого ничего не
/// зарегистрировано.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnroutablePolicy {
    /// Молча отбросить, ответа не будет (поведение по умолчанию).
    #[default]
    Drop,
    /// Ответить отказом со статусом `404`.
    Reject,
}

/// Настройки сервиса канала.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Имя сервиса в логах.
    pub name: String,
    pub unroutable: UnroutablePolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "postbridge".to_string(),
            unroutable: UnroutablePolicy::Drop,
        }
    }
}

impl ServiceConfig {
    pub fn with_name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_unroutable(
        mut self,
        policy: UnroutablePolicy,
    ) -> Self {
        self.unroutable = policy;
        self
    }
}

/// Настройки клиента канала.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Сколько ждать ответа на запрос, подписку или отписку.
    pub request_timeout_ms: u64,
    /// Ёмкость буфера событий на одно назначение.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            event_capacity: 64,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }

    pub fn with_request_timeout_ms(
        mut self,
        ms: u64,
    ) -> Self {
        self.request_timeout_ms = ms;
        self
    }
}

/// Полные настройки процесса-хоста.
///
/// Библиотека сама окружение не читает: хост вызывает [`Settings::load`],
/// если хочет брать настройки из переменных `POSTBRIDGE__*`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub service: ServiceConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Значения по умолчанию, перекрытые переменными окружения.
    ///
    /// Пример: `POSTBRIDGE__SERVICE__UNROUTABLE=reject`,
    /// `POSTBRIDGE__CLIENT__REQUEST_TIMEOUT_MS=250`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(None, Environment::with_prefix("POSTBRIDGE"))
    }

    /// Значения по умолчанию, затем файл (если он есть), затем окружение.
    /// Формат файла определяется по расширению (`.toml`, `.json`, ...).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::build(
            Some(path.as_ref()),
            Environment::with_prefix("POSTBRIDGE"),
        )
    }

    /// То же, что [`Settings::load`], но с явно заданным источником.
    pub fn from_env(env: Environment) -> Result<Self, ConfigError> {
        Self::build(None, env)
    }

    fn build(
        file: Option<&Path>,
        env: Environment,
    ) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("service.name", defaults.service.name)?
            .set_default("service.unroutable", "drop")?
            .set_default("client.request_timeout_ms", defaults.client.request_timeout_ms)?
            .set_default("client.event_capacity", defaults.client.event_capacity as u64)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", "compact")?;
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }
        let cfg = builder
            .add_source(env.prefix_separator("__").separator("__").try_parsing(true))
            .build()?;

        cfg.try_deserialize()
    }
}
