use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde_repr")]
use serde_repr::{Deserialize_repr, Serialize_repr};
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок канала.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки данных и маршрутизации
/// - 3xxx: Ошибки обработчиков
/// - 6xxx: Транспорт / IO
/// - 8xxx: Протокольные ошибки
///
/// Внутренний код не совпадает с кодом, который уходит на провод: на провод
/// попадает только [`StatusCode::wire_status`] (`200`, `400` или `404`).
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[cfg_attr(feature = "serde_repr", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unexpected = 1001,
    Internal = 1002,
    InvalidArgs = 1003,
    NotImplemented = 1004,
    Panicked = 1005,

    // === 2xxx: Данные и маршрутизация ===
    NotFound = 2000,
    InvalidData = 2001,
    InvalidValue = 2002,
    AlreadyExists = 2003,

    // === 3xxx: Обработчики ===
    HandlerFailed = 3000,
    HookFailed = 3001,
    Rejected = 3002,

    // === 6xxx: Транспорт ===
    Io = 6000,
    PeerGone = 6001,
    TransportClosed = 6002,
    Timeout = 6003,

    // === 8xxx: Протокол ===
    ProtocolError = 8000,
    EncodingError = 8001,
    DecodingError = 8002,
    UnexpectedKind = 8003,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    ///
    /// Использует `TryFrom<u32>` из `num_enum`; возвращает `None`, если
    /// значение не соответствует ни одному варианту.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Вернёт `true`, если переданный `code` означает успешный результат.
    pub fn is_success(code: u32) -> bool {
        Self::Success as u32 == code
    }

    /// Имеет ли смысл повторить операцию (клиент может переотправить
    /// запрос).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::PeerGone | Self::TransportClosed)
    }

    /// Ошибка со стороны отправителя: проблема в запросе или данных.
    pub fn is_client_error(&self) -> bool {
        let c = self.code();
        if (2000..=2999).contains(&c) {
            return true;
        }
        matches!(self, Self::InvalidArgs | Self::Rejected)
    }

    /// Ошибка стороны сервиса: внутренняя или ошибка обработчика.
    pub fn is_server_error(&self) -> bool {
        let c = self.code();
        (1000..=1999).contains(&c) || matches!(self, Self::HandlerFailed | Self::HookFailed)
    }

    /// Ошибка транспорта (диапазон 6xxx).
    pub fn is_transport_error(&self) -> bool {
        (6000..=6999).contains(&self.code())
    }

    /// Ошибка протокола или кодека (диапазон 8xxx).
    pub fn is_protocol_error(&self) -> bool {
        (8000..=8999).contains(&self.code())
    }

    /// Требуется ли логировать как критическую ошибку.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Internal | Self::Panicked)
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::NotFound | Self::PeerGone => LogLevel::Debug,
            Self::InvalidArgs | Self::InvalidData | Self::InvalidValue | Self::Rejected => {
                LogLevel::Info
            }
            Self::Internal | Self::Panicked => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }

    /// Статус, который уходит в поле `status` нисходящего сообщения.
    ///
    /// Протокол различает только успех, отказ и (опционально) отсутствие
    /// получателя.
    pub fn wire_status(&self) -> u16 {
        match self {
            Self::Success => 200,
            Self::NotFound => 404,
            _ => 400,
        }
    }

    /// Стабильное snake_case имя кода, используется как `kind` в теле ошибки.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Unknown => "unknown",
            Self::Unexpected => "unexpected",
            Self::Internal => "internal",
            Self::InvalidArgs => "invalid_args",
            Self::NotImplemented => "not_implemented",
            Self::Panicked => "panicked",
            Self::NotFound => "not_found",
            Self::InvalidData => "invalid_data",
            Self::InvalidValue => "invalid_value",
            Self::AlreadyExists => "already_exists",
            Self::HandlerFailed => "handler_failed",
            Self::HookFailed => "hook_failed",
            Self::Rejected => "rejected",
            Self::Io => "io",
            Self::PeerGone => "peer_gone",
            Self::TransportClosed => "transport_closed",
            Self::Timeout => "timeout",
            Self::ProtocolError => "protocol_error",
            Self::EncodingError => "encoding_error",
            Self::DecodingError => "decoding_error",
            Self::UnexpectedKind => "unexpected_kind",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что на провод уходят только 200/400/404.
    #[test]
    fn test_wire_status_mapping() {
        assert_eq!(StatusCode::Success.wire_status(), 200);
        assert_eq!(StatusCode::NotFound.wire_status(), 404);
        assert_eq!(StatusCode::HandlerFailed.wire_status(), 400);
        assert_eq!(StatusCode::Panicked.wire_status(), 400);
        assert_eq!(StatusCode::InvalidData.wire_status(), 400);
    }

    /// Тест проверяет разделение клиентских и серверных ошибок.
    #[test]
    fn test_client_vs_server() {
        assert!(StatusCode::InvalidData.is_client_error());
        assert!(StatusCode::Rejected.is_client_error());
        assert!(StatusCode::Internal.is_server_error());
        assert!(StatusCode::HookFailed.is_server_error());
        assert!(!StatusCode::NotFound.is_server_error());
    }

    /// Тест проверяет конвертацию через `TryFrom<u32>` и `from_u32`.
    #[test]
    fn test_from_try_from_u32() {
        let n = StatusCode::PeerGone.code();
        assert_eq!(StatusCode::try_from(n).unwrap(), StatusCode::PeerGone);
        assert!(StatusCode::from_u32(99999).is_none());
        assert!(StatusCode::is_success(0));
    }

    #[test]
    fn test_kind_names_are_snake_case() {
        assert_eq!(StatusCode::NotFound.kind(), "not_found");
        assert_eq!(StatusCode::HandlerFailed.kind(), "handler_failed");
        assert_eq!(StatusCode::InvalidData.kind(), "invalid_data");
    }

    /// Тест проверяет диапазоны транспортных и протокольных ошибок.
    #[test]
    fn test_ranges() {
        assert!(StatusCode::PeerGone.is_transport_error());
        assert!(StatusCode::Timeout.is_retryable());
        assert!(StatusCode::DecodingError.is_protocol_error());
        assert!(!StatusCode::DecodingError.is_transport_error());
    }

    #[test]
    fn test_log_level_mappings() {
        assert_eq!(StatusCode::Success.log_level(), LogLevel::Trace);
        assert_eq!(StatusCode::PeerGone.log_level(), LogLevel::Debug);
        assert_eq!(StatusCode::Panicked.log_level(), LogLevel::Error);
        assert_eq!(StatusCode::HandlerFailed.log_level(), LogLevel::Warn);
    }

    /// Тест проверяет формат `Display`: имя варианта и числовой код.
    #[test]
    fn test_display_contains_name_and_code() {
        let s = format!("{}", StatusCode::NotFound);
        assert!(s.contains("2000"), "Display must contain code, got: {s}");
        assert!(s.contains("NotFound"), "Display must contain name, got: {s}");
    }
}
