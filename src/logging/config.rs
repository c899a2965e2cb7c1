use serde::{Deserialize, Serialize};

/// Формат вывода событий.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    #[default]
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Базовый уровень: `trace`, `debug`, `info`, `warn` или `error`.
    pub level: String,
    pub format: LogFormat,
    /// Дополнительные директивы вида `postbridge::service=debug`.
    pub directives: Vec<String>,
    pub with_target: bool,
    pub with_ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            directives: Vec::new(),
            with_target: true,
            with_ansi: true,
        }
    }
}

impl LoggingConfig {
    const LEVELS: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];

    pub fn validate(&self) -> Result<(), String> {
        let level = self.level.to_lowercase();
        if !Self::LEVELS.contains(&level.as_str()) {
            return Err(format!("unknown log level `{}`", self.level));
        }
        Ok(())
    }

    /// Строка для `EnvFilter`: уровень и затем директивы.
    pub fn build_filter_directive(&self) -> String {
        let mut parts = vec![self.level.to_lowercase()];
        parts.extend(self.directives.iter().cloned());
        parts.join(",")
    }
}
