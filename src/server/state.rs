//! # Estado de la Sesión
//! src/server/state.rs
//!
//! ```text
//! Stopped --start()--> Starting
//! Starting --bind ok--> Running
//! Starting --bind error--> Stopped
//! Running --stop()--> Stopping
//! Stopping --loop terminado--> Stopped
//! ```
//!
//! Estado y puerto viven bajo el mismo mutex, compartido entre el thread
//! que controla la sesión y el serve loop. Cada transición publica
//! exactamente un evento mientras se tiene el lock, así el orden de los
//! eventos es el orden de las transiciones.

use crate::events::{EventSender, LogEvent, Severity};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Estados posibles de una sesión
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Stopped => "stopped",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
        }
    }

    /// Estados en los que hay un puerto asignado
    pub fn has_port(&self) -> bool {
        matches!(self, SessionState::Running | SessionState::Stopping)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    bound_port: Option<u16>,
    /// Se incrementa en cada start(); identifica al serve loop actual
    generation: u64,
}

/// Estado compartido de la sesión
pub(crate) struct StateCell {
    inner: Mutex<Inner>,
    events: EventSender,
}

impl StateCell {
    pub(crate) fn new(events: EventSender) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::Stopped,
                bound_port: None,
                generation: 0,
            }),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, inner: &Inner, severity: Severity, message: String) {
        debug_assert_eq!(inner.bound_port.is_some(), inner.state.has_port());
        self.events
            .publish(LogEvent::transition(inner.state, severity, message));
    }

    pub(crate) fn state(&self) -> SessionState {
        self.lock().state
    }

    pub(crate) fn bound_port(&self) -> Option<u16> {
        self.lock().bound_port
    }

    /// (estado, puerto) leídos de forma atómica
    pub(crate) fn snapshot(&self) -> (SessionState, Option<u16>) {
        let inner = self.lock();
        (inner.state, inner.bound_port)
    }

    /// Stopped → Starting. Retorna la nueva generación, o el estado actual
    /// si la sesión no estaba detenida.
    pub(crate) fn begin_start(&self, message: String) -> Result<u64, SessionState> {
        let mut inner = self.lock();
        if inner.state != SessionState::Stopped {
            return Err(inner.state);
        }
        inner.state = SessionState::Starting;
        inner.generation += 1;
        self.emit(&inner, Severity::Info, message);
        Ok(inner.generation)
    }

    /// Starting → Running con el puerto ya enlazado
    pub(crate) fn mark_running(&self, generation: u64, port: u16, message: String) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state != SessionState::Starting {
            return false;
        }
        inner.state = SessionState::Running;
        inner.bound_port = Some(port);
        self.emit(&inner, Severity::Info, message);
        true
    }

    /// Starting → Stopped por un fallo de arranque
    pub(crate) fn abort_start(&self, generation: u64, message: String) {
        let mut inner = self.lock();
        if inner.generation != generation || inner.state != SessionState::Starting {
            return;
        }
        inner.state = SessionState::Stopped;
        inner.bound_port = None;
        self.emit(&inner, Severity::Error, message);
    }

    /// Running → Stopping. Retorna la generación a detener.
    pub(crate) fn begin_stop(&self, message: String) -> Option<u64> {
        let mut inner = self.lock();
        if inner.state != SessionState::Running {
            return None;
        }
        inner.state = SessionState::Stopping;
        self.emit(&inner, Severity::Info, message);
        Some(inner.generation)
    }

    /// Running/Stopping → Stopped, solo si `generation` sigue siendo la
    /// actual. Lo llaman tanto el serve loop al salir como el coordinador
    /// cuando abandona al worker; solo el primero publica el evento.
    pub(crate) fn finish(
        &self,
        generation: u64,
        severity: Severity,
        message: impl FnOnce(SessionState) -> String,
    ) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation || !inner.state.has_port() {
            return false;
        }
        let previous = inner.state;
        inner.state = SessionState::Stopped;
        inner.bound_port = None;
        let severity = if previous == SessionState::Running {
            Severity::Error
        } else {
            severity
        };
        self.emit(&inner, severity, message(previous));
        true
    }
}
