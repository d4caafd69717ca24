//! # Coordinador de Shutdown
//! src/server/shutdown.rs
//!
//! Detiene el serve loop con un límite de tiempo duro:
//!
//! 1. `running = false`: el loop no empieza otro ciclo de accept
//! 2. `SO_LINGER = 0` en el listener: cerrarlo no espera a vaciar buffers
//! 3. cerrar el listener para aceptar conexiones; el `accept()` bloqueado
//!    falla y el loop, al ver `running == false`, termina
//! 4. esperar al thread hasta `timeout`
//! 5. si no terminó, se abandona: el thread puede seguir terminando su
//!    request en segundo plano, pero ya no se aceptan conexiones nuevas
//!
//! El listener pertenece al thread del serve loop; aquí solo se guarda un
//! `Weak`. Cuando el thread termina (por cualquier motivo) el socket se
//! cierra y el puerto queda libre.

use socket2::SockRef;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Intervalo entre chequeos de `is_finished()`
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Límite para la conexión de despertar
const WAKE_CONNECT_TIMEOUT: Duration = Duration::from_millis(100);

/// Resultado de [`force_stop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// El serve loop terminó dentro del límite
    Terminated,
    /// El serve loop no terminó a tiempo y se abandonó su thread
    ForcedAbandon,
}

/// Lo que el coordinador necesita para detener un serve loop
pub(crate) struct WorkerHandle {
    pub(crate) listener: Weak<TcpListener>,
    pub(crate) running: Arc<AtomicBool>,
    pub(crate) thread: JoinHandle<()>,
    pub(crate) local_addr: SocketAddr,
}

/// Detiene el serve loop; nunca tarda mucho más que `timeout`
pub(crate) fn force_stop(worker: WorkerHandle, timeout: Duration) -> ShutdownOutcome {
    let started = Instant::now();
    let WorkerHandle {
        listener,
        running,
        thread,
        local_addr,
    } = worker;

    // 1.
    running.store(false, Ordering::Release);

    // Sin referencia viva el thread ya soltó el listener
    if let Some(listener) = listener.upgrade() {
        close_listener(&listener, local_addr);
    }

    // 4.
    loop {
        if thread.is_finished() {
            if thread.join().is_err() {
                warn!(%local_addr, "serve loop thread panicked");
            }
            let elapsed_ms = started.elapsed().as_millis() as u64;
            debug!(%local_addr, elapsed_ms, "serve loop terminated");
            return ShutdownOutcome::Terminated;
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            break;
        }
        thread::sleep(JOIN_POLL_INTERVAL.min(timeout - elapsed));
    }

    // 5. Soltar el JoinHandle deja el thread desacoplado
    let timeout_ms = timeout.as_millis() as u64;
    warn!(%local_addr, timeout_ms, "serve loop did not exit in time, abandoning it");
    drop(thread);
    ShutdownOutcome::ForcedAbandon
}

/// Pasos 2 y 3
fn close_listener(listener: &Arc<TcpListener>, local_addr: SocketAddr) {
    let socket = SockRef::from(listener.as_ref());
    if let Err(err) = socket.set_linger(Some(Duration::ZERO)) {
        warn!(%local_addr, error = %err, "failed to set SO_LINGER on listener");
    }

    // En Linux shutdown() despierta al accept(); si la plataforma no lo
    // permite sobre un listener, una conexión propia lo despierta igual.
    if let Err(err) = socket.shutdown(Shutdown::Both) {
        debug!(%local_addr, error = %err, "listener shutdown failed, waking accept");
        wake_accept(local_addr);
    }
}

fn wake_accept(addr: SocketAddr) {
    match TcpStream::connect_timeout(&addr, WAKE_CONNECT_TIMEOUT) {
        Ok(stream) => drop(stream),
        Err(err) => debug!(%addr, error = %err, "wake-up connection failed"),
    }
}
