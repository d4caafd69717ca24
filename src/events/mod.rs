//! # Eventos
//!
//! Canal por el que la sesión reporta su estado a la interfaz.

pub mod channel;
pub mod event;

pub use channel::{event_channel, EventReceiver, EventSender, DEFAULT_EVENT_CAPACITY};
pub use event::{LogEvent, Severity};
