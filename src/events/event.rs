//! # Eventos de Log
//! src/events/event.rs
//!
//! Un [`LogEvent`] por cada cambio de estado de la sesión, más eventos
//! informativos (requests servidos, errores de conexión, etc.).

use crate::server::SessionState;
use jiff::Timestamp;
use serde::Serialize;

/// Severidad de un evento
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evento publicado en el canal de eventos
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEvent {
    /// Momento de la emisión
    pub timestamp: Timestamp,

    pub severity: Severity,

    pub message: String,

    /// Estado al que transicionó la sesión; `None` en eventos informativos
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<SessionState>,
}

impl LogEvent {
    /// Evento informativo con timestamp actual
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Timestamp::now(),
            severity,
            message: message.into(),
            state: None,
        }
    }

    /// Evento de transición hacia `state`
    pub fn transition(state: SessionState, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            state: Some(state),
            ..Self::new(severity, message)
        }
    }

    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(Severity::Debug, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Verifica si el evento corresponde a un cambio de estado
    pub fn is_transition(&self) -> bool {
        self.state.is_some()
    }
}

impl std::fmt::Display for LogEvent {
    /// Formato: `[2025-01-01T10:00:00Z] info: mensaje`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.timestamp, self.severity, self.message)
    }
}
