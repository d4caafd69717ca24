//! # Canal de Eventos
//! src/events/channel.rs
//!
//! Cola FIFO multi-productor / un consumidor entre el serve loop y la
//! interfaz (consola, GUI).
//!
//! - `publish` nunca bloquea: si la cola está llena el evento se descarta
//!   y se cuenta en `dropped`
//! - `drain` tampoco bloquea: devuelve lo que haya, en orden de publicación
//!
//! El consumidor decide cada cuánto hace `drain` (polling cooperativo).

use super::{LogEvent, Severity};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

/// Capacidad por defecto; el volumen normal de eventos es bajo
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Crea un canal con capacidad `capacity` (mínimo 1)
///
/// # Ejemplo
/// ```
/// use html_launcher::events::{event_channel, LogEvent};
///
/// let (events, receiver) = event_channel(16);
/// events.publish(LogEvent::info("hola"));
///
/// let drained = receiver.drain();
/// assert_eq!(drained.len(), 1);
/// assert!(receiver.drain().is_empty());
/// ```
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        EventSender {
            tx,
            dropped: Arc::clone(&dropped),
        },
        EventReceiver { rx, dropped },
    )
}

/// Lado productor; se clona para cada thread que publica
#[derive(Clone)]
pub struct EventSender {
    tx: SyncSender<LogEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Publica un evento sin bloquear
    ///
    /// El evento también se emite por `tracing`. Si la cola está llena se
    /// descarta; si el receptor ya no existe se ignora.
    pub fn publish(&self, event: LogEvent) {
        trace_event(&event);
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Eventos descartados por cola llena
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Lado consumidor
pub struct EventReceiver {
    rx: Receiver<LogEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventReceiver {
    /// Retira todos los eventos pendientes, en orden FIFO
    pub fn drain(&self) -> Vec<LogEvent> {
        self.rx.try_iter().collect()
    }

    /// Eventos descartados por cola llena
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

fn trace_event(event: &LogEvent) {
    let state = event.state.map(|s| s.as_str()).unwrap_or("-");
    match event.severity {
        Severity::Debug => tracing::debug!(state, "{}", event.message),
        Severity::Info => tracing::info!(state, "{}", event.message),
        Severity::Warning => tracing::warn!(state, "{}", event.message),
        Severity::Error => tracing::error!(state, "{}", event.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_drain_preserves_order() {
        let (events, receiver) = event_channel(16);
        for i in 0..10 {
            events.publish(LogEvent::info(format!("evento {i}")));
        }

        let messages: Vec<String> = receiver.drain().into_iter().map(|e| e.message).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("evento {i}")).collect();
        assert_eq!(messages, expected);
    }

    #[test]
    fn test_drain_empty_does_not_block() {
        let (_events, receiver) = event_channel(4);
        assert!(receiver.drain().is_empty());
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let (events, receiver) = event_channel(2);
        for i in 0..5 {
            events.publish(LogEvent::info(format!("{i}")));
        }

        assert_eq!(receiver.drain().len(), 2);
        assert_eq!(receiver.dropped(), 3);
        assert_eq!(events.dropped(), 3);
    }

    #[test]
    fn test_publish_after_receiver_dropped() {
        let (events, receiver) = event_channel(2);
        drop(receiver);
        // No debe hacer panic
        events.publish(LogEvent::info("nadie escucha"));
    }

    #[test]
    fn test_multiple_producers_keep_per_producer_order() {
        let (events, receiver) = event_channel(1000);

        let handles: Vec<_> = (0..4)
            .map(|producer| {
                let events = events.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        events.publish(LogEvent::debug(format!("{producer}:{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let drained = receiver.drain();
        assert_eq!(drained.len(), 200);

        for producer in 0..4 {
            let prefix = format!("{producer}:");
            let sequence: Vec<u32> = drained
                .iter()
                .filter_map(|e| e.message.strip_prefix(&prefix))
                .map(|n| n.parse().unwrap())
                .collect();
            assert_eq!(sequence, (0..50).collect::<Vec<u32>>());
        }
    }
}
