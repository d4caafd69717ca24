//! # HTML Launcher
//! src/lib.rs
//!
//! Lanzador de un servidor HTTP/1.0 local que sirve `index.html` (y el
//! resto de los archivos) desde un directorio, con control de arranque y
//! detención desde una interfaz.
//!
//! ## Arquitectura
//!
//! El launcher está dividido en módulos especializados:
//! - `http`: Parsing y manejo del protocolo HTTP/1.0
//! - `responder`: Archivos estáticos detrás del trait `Responder`
//! - `server`: Puertos, sesión, serve loop y shutdown con límite de tiempo
//! - `events`: Canal de eventos entre el servidor y la interfaz
//! - `metrics`: Métricas de requests de la sesión
//! - `config` / `logging`: Configuración CLI y subscriber de tracing
//! - `console`: Interfaz de terminal
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use html_launcher::events::event_channel;
//! use html_launcher::server::{PortRequest, ServerSession, SessionConfig};
//!
//! let (events, receiver) = event_channel(64);
//! let mut session = ServerSession::new(".", SessionConfig::default(), events)?;
//! let port = session.start(PortRequest::Auto)?;
//! println!("http://127.0.0.1:{port}/");
//! session.stop();
//! # Ok::<(), html_launcher::error::LauncherError>(())
//! ```

pub mod config;
pub mod console;
pub mod error;
pub mod events;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod responder;
pub mod server;
