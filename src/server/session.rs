//! # Sesión del Servidor
//! src/server/session.rs
//!
//! Controlador del ciclo de vida: resuelve el puerto, hace el bind, lanza
//! el serve loop en su propio thread y lo detiene con un límite de tiempo.
//!
//! ```text
//! start(PortRequest)
//!   ├─ index.html presente?     (require_index)
//!   ├─ Stopped → Starting
//!   ├─ PortAllocator + bind     (falla → Stopped + error)
//!   ├─ Starting → Running
//!   └─ thread "serve-loop-<port>"
//!
//! stop()
//!   ├─ Running → Stopping
//!   ├─ force_stop(timeout)
//!   └─ Stopping → Stopped       (el serve loop, o aquí si se abandonó)
//! ```
//!
//! Ningún fallo de arranque o de shutdown tumba el proceso: la sesión
//! queda en `Stopped`, se publica un evento y se devuelve el error.

use super::port::{bind_listener, PortAllocator, DEFAULT_BASE_PORT, DEFAULT_PORT_RANGE};
use super::serve_loop::{serve_loop, ServeContext};
use super::shutdown::{force_stop, ShutdownOutcome, WorkerHandle};
use super::state::{SessionState, StateCell};
use crate::error::{LauncherError, Result};
use crate::events::{EventSender, LogEvent, Severity};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::responder::static_files::list_html_files;
use crate::responder::{Responder, StaticFileResponder};
use serde::Serialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Límite por defecto para que el serve loop termine
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);
/// Timeout de lectura/escritura por conexión
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Archivo que debe existir en la raíz con `require_index`
const INDEX_FILE: &str = "index.html";

/// Parámetros de una sesión
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Dirección loopback donde escucha el servidor
    pub host: IpAddr,
    /// Primer puerto para `PortRequest::Auto`
    pub base_port: u16,
    /// Cantidad de puertos a probar
    pub port_range: u16,
    /// Cuánto espera `stop()` al serve loop antes de abandonarlo
    pub shutdown_timeout: Duration,
    pub io_timeout: Duration,
    /// Exigir `index.html` en la raíz antes de arrancar
    pub require_index: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            base_port: DEFAULT_BASE_PORT,
            port_range: DEFAULT_PORT_RANGE,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            require_index: true,
        }
    }
}

/// Qué puerto pedir en `start()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortRequest {
    /// El primero libre desde `base_port`
    #[default]
    Auto,
    /// Este puerto; si está ocupado, el primero libre a partir de él.
    /// `Specific(0)` equivale a `Auto`.
    Specific(u16),
}

/// Estado completo de la sesión para la interfaz
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state: SessionState,
    pub bound_port: Option<u16>,
    pub url: Option<String>,
    pub root: PathBuf,
    pub html_files: Vec<String>,
    pub requests: MetricsSnapshot,
    pub dropped_events: u64,
}

/// Una sesión de servidor sobre un directorio raíz
///
/// # Ejemplo
/// ```no_run
/// use html_launcher::events::event_channel;
/// use html_launcher::server::{PortRequest, ServerSession, SessionConfig};
///
/// let (events, receiver) = event_channel(64);
/// let mut session = ServerSession::new(".", SessionConfig::default(), events)?;
///
/// let port = session.start(PortRequest::Auto)?;
/// println!("http://127.0.0.1:{port}/");
///
/// session.stop();
/// for event in receiver.drain() {
///     println!("{event}");
/// }
/// # Ok::<(), html_launcher::error::LauncherError>(())
/// ```
pub struct ServerSession {
    root: PathBuf,
    config: SessionConfig,
    responder: Arc<dyn Responder>,
    state: Arc<StateCell>,
    metrics: MetricsCollector,
    events: EventSender,
    worker: Option<WorkerHandle>,
}

impl ServerSession {
    /// Crea una sesión que sirve los archivos de `root`
    pub fn new(root: impl AsRef<Path>, config: SessionConfig, events: EventSender) -> Result<Self> {
        let path = root.as_ref();
        let responder = StaticFileResponder::new(path).map_err(|source| LauncherError::Root {
            path: path.to_path_buf(),
            source,
        })?;
        let root = responder.root().to_path_buf();
        Ok(Self::build(root, config, events, Arc::new(responder)))
    }

    /// Crea una sesión con un responder propio; `root` solo se usa para
    /// el chequeo de `index.html` y el status.
    pub fn with_responder(
        root: impl AsRef<Path>,
        config: SessionConfig,
        events: EventSender,
        responder: Arc<dyn Responder>,
    ) -> Result<Self> {
        let path = root.as_ref();
        let root = fs::canonicalize(path).map_err(|source| LauncherError::Root {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::build(root, config, events, responder))
    }

    fn build(
        root: PathBuf,
        config: SessionConfig,
        events: EventSender,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            root,
            config,
            responder,
            state: Arc::new(StateCell::new(events.clone())),
            metrics: MetricsCollector::new(),
            events,
            worker: None,
        }
    }

    /// Arranca el servidor y retorna el puerto enlazado
    pub fn start(&mut self, request: PortRequest) -> Result<u16> {
        self.reap_worker();

        let current = self.state.state();
        if current != SessionState::Stopped {
            return Err(LauncherError::InvalidState(current));
        }

        if self.config.require_index && !self.root.join(INDEX_FILE).is_file() {
            self.events.publish(LogEvent::error(format!(
                "{INDEX_FILE} not found in {}",
                self.root.display()
            )));
            return Err(LauncherError::MissingIndex(self.root.clone()));
        }

        let generation = self
            .state
            .begin_start(format!("starting server for {}", self.root.display()))
            .map_err(LauncherError::InvalidState)?;

        let (listener, port) = match self.bind(request) {
            Ok(bound) => bound,
            Err(err) => {
                self.state
                    .abort_start(generation, format!("failed to start server: {err}"));
                return Err(err);
            }
        };

        // Un serve loop abandonado conserva el collector anterior
        self.metrics = MetricsCollector::new();
        let url = self.url_for(port);
        self.state.mark_running(
            generation,
            port,
            format!("serving {} at {url}", self.root.display()),
        );

        let listener = Arc::new(listener);
        let running = Arc::new(AtomicBool::new(true));
        let weak_listener = Arc::downgrade(&listener);
        let ctx = ServeContext {
            listener,
            running: Arc::clone(&running),
            state: Arc::clone(&self.state),
            generation,
            port,
            responder: Arc::clone(&self.responder),
            metrics: self.metrics.clone(),
            events: self.events.clone(),
            io_timeout: self.config.io_timeout,
        };

        // Si el spawn falla el closure (y con él el listener) se libera
        let spawned = thread::Builder::new()
            .name(format!("serve-loop-{port}"))
            .spawn(move || serve_loop(ctx));

        match spawned {
            Ok(thread) => {
                self.worker = Some(WorkerHandle {
                    listener: weak_listener,
                    running,
                    thread,
                    local_addr: SocketAddr::new(self.config.host, port),
                });
                let root = self.root.display();
                info!(port, host = %self.config.host, root = %root, "server started");
                Ok(port)
            }
            Err(err) => {
                self.state.finish(generation, Severity::Error, |_| {
                    format!("failed to spawn serve loop on port {port}: {err}")
                });
                Err(LauncherError::Spawn(err))
            }
        }
    }

    /// Resuelve el puerto y hace el bind real
    fn bind(&self, request: PortRequest) -> Result<(TcpListener, u16)> {
        let host = self.config.host;
        let base = match request {
            PortRequest::Specific(port) if port != 0 => {
                match bind_listener(SocketAddr::new(host, port)) {
                    Ok(listener) => return Ok((listener, port)),
                    Err(err) => {
                        debug!(port, error = %err, "requested port busy, searching from it");
                    }
                }
                port
            }
            _ => self.config.base_port,
        };
        let allocator = PortAllocator::new(base, self.config.port_range).with_host(host);

        let port = allocator
            .find_available()
            .ok_or(LauncherError::PortUnavailable {
                host,
                base: allocator.base_port(),
                end: allocator.end(),
            })?;

        // El puerto puede haberse ocupado desde el bind de prueba
        let addr = SocketAddr::new(host, port);
        let listener = bind_listener(addr).map_err(|source| LauncherError::Bind { addr, source })?;
        Ok((listener, port))
    }

    /// Detiene el servidor; `None` si ya estaba detenido
    ///
    /// Nunca tarda mucho más que `shutdown_timeout`. Al retornar la
    /// sesión está en `Stopped` en ambos casos.
    pub fn stop(&mut self) -> Option<ShutdownOutcome> {
        let (state, port) = self.state.snapshot();
        if state != SessionState::Running {
            self.reap_worker();
            return None;
        }
        let port = port.unwrap_or_default();

        let generation = self
            .state
            .begin_stop(format!("stopping server on port {port}"))?;

        let Some(worker) = self.worker.take() else {
            self.state.finish(generation, Severity::Warning, |_| {
                format!("server on port {port} had no serve loop; marked stopped")
            });
            return Some(ShutdownOutcome::Terminated);
        };

        let timeout = self.config.shutdown_timeout;
        let outcome = force_stop(worker, timeout);
        match outcome {
            ShutdownOutcome::Terminated => {
                // El serve loop ya publicó Stopped al salir; esto no hace nada
                self.state.finish(generation, Severity::Info, |_| {
                    format!("server on port {port} stopped")
                });
            }
            ShutdownOutcome::ForcedAbandon => {
                self.state.finish(generation, Severity::Warning, |_| {
                    format!(
                        "serve loop on port {port} did not stop within {}ms; abandoned",
                        timeout.as_millis()
                    )
                });
            }
        }
        info!(port, ?outcome, "server stopped");
        Some(outcome)
    }

    /// Libera el handle de un serve loop que terminó por su cuenta
    fn reap_worker(&mut self) {
        if self.state.state() != SessionState::Stopped {
            return;
        }
        if let Some(worker) = self.worker.take() {
            if worker.thread.is_finished() && worker.thread.join().is_err() {
                debug!(addr = %worker.local_addr, "reaped serve loop that panicked");
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.state()
    }

    /// Puerto enlazado, solo en `Running`/`Stopping`
    pub fn bound_port(&self) -> Option<u16> {
        self.state.bound_port()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// URL del servidor mientras tiene puerto
    pub fn url(&self) -> Option<String> {
        self.bound_port().map(|port| self.url_for(port))
    }

    /// `http://host:port/`, con corchetes para IPv6
    fn url_for(&self, port: u16) -> String {
        format!("http://{}/", SocketAddr::new(self.config.host, port))
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn status(&self) -> StatusSnapshot {
        let (state, bound_port) = self.state.snapshot();
        StatusSnapshot {
            state,
            bound_port,
            url: bound_port.map(|port| self.url_for(port)),
            root: self.root.clone(),
            html_files: list_html_files(&self.root),
            requests: self.metrics.snapshot(),
            dropped_events: self.events.dropped(),
        }
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        self.stop();
    }
}
