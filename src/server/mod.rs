//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! Ciclo de vida del servidor local:
//! 1. Buscar un puerto libre (`port`)
//! 2. Hacer el bind y lanzar el serve loop (`session`, `serve_loop`)
//! 3. Atender una conexión a la vez (`connection`)
//! 4. Detenerlo con un límite de tiempo (`shutdown`)
//!
//! Cada transición de estado (`state`) se publica en el canal de eventos.

pub mod connection;
pub mod port;
mod serve_loop;
pub mod session;
pub mod shutdown;
pub mod state;

// Re-exportar para facilitar el uso
pub use port::{find_available_port, PortAllocator, DEFAULT_BASE_PORT, DEFAULT_PORT_RANGE};
pub use session::{
    PortRequest, ServerSession, SessionConfig, StatusSnapshot, DEFAULT_IO_TIMEOUT,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use shutdown::ShutdownOutcome;
pub use state::SessionState;
