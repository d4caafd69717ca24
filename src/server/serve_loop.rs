//! # Serve Loop
//! src/server/serve_loop.rs
//!
//! Corre en su propio thread mientras la sesión está `Running`/`Stopping`:
//! acepta una conexión, la atiende de forma sincrónica y vuelve a revisar
//! el flag `running`. Con un request a la vez, detener el servidor nunca
//! tiene que esperar más que el request en curso.
//!
//! Para salir del `accept()` bloqueante el coordinador de shutdown cierra
//! el listener; el error resultante con `running == false` es la señal
//! de terminar, no una falla.

use super::connection::handle_connection;
use super::state::{SessionState, StateCell};
use crate::events::{EventSender, LogEvent, Severity};
use crate::metrics::MetricsCollector;
use crate::responder::Responder;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Pausa tras un error de accept mientras el servidor sigue activo
/// (ej: EMFILE), para no girar en vacío.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Todo lo que necesita el thread del serve loop
pub(crate) struct ServeContext {
    pub(crate) listener: Arc<TcpListener>,
    pub(crate) running: Arc<AtomicBool>,
    pub(crate) state: Arc<StateCell>,
    pub(crate) generation: u64,
    pub(crate) port: u16,
    pub(crate) responder: Arc<dyn Responder>,
    pub(crate) metrics: MetricsCollector,
    pub(crate) events: EventSender,
    pub(crate) io_timeout: Duration,
}

/// Hace la transición final a `Stopped` cuando el thread termina, por
/// cualquier camino, incluido un panic fuera del responder.
struct ExitGuard {
    state: Arc<StateCell>,
    generation: u64,
    port: u16,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let port = self.port;
        let message = |previous: SessionState| match previous {
            SessionState::Running if thread::panicking() => {
                format!("serve loop on port {port} panicked; server stopped")
            }
            SessionState::Running => {
                format!("serve loop on port {port} exited unexpectedly; server stopped")
            }
            _ => format!("server on port {port} stopped"),
        };
        self.state.finish(self.generation, Severity::Info, message);
    }
}

pub(crate) fn serve_loop(ctx: ServeContext) {
    let _guard = ExitGuard {
        state: Arc::clone(&ctx.state),
        generation: ctx.generation,
        port: ctx.port,
    };
    tracing::debug!(port = ctx.port, "serve loop started");

    while ctx.running.load(Ordering::Acquire) {
        match ctx.listener.accept() {
            Ok((stream, peer)) => {
                // Puede ser la conexión de despertar del coordinador
                if !ctx.running.load(Ordering::Acquire) {
                    break;
                }
                if let Err(err) = handle_connection(
                    stream,
                    ctx.responder.as_ref(),
                    &ctx.metrics,
                    &ctx.events,
                    ctx.io_timeout,
                ) {
                    ctx.metrics.record_failure();
                    ctx.events
                        .publish(LogEvent::warning(format!("request from {peer} failed: {err}")));
                }
            }
            Err(err) => {
                if !ctx.running.load(Ordering::Acquire) {
                    break;
                }
                ctx.events
                    .publish(LogEvent::warning(format!("accept failed: {err}")));
                thread::sleep(ACCEPT_BACKOFF);
            }
        }
    }

    tracing::debug!(port = ctx.port, "serve loop exiting");
}
