//! Errores del controlador de la sesión.
//!
//! Ninguno es fatal para el proceso: la sesión vuelve (o se queda) en
//! `Stopped`, se publica un evento y el error se devuelve al llamador.
//! Los errores de un request individual no llegan hasta aquí; se registran
//! como eventos y el serve loop continúa.

use crate::server::SessionState;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LauncherError {
    /// Ningún puerto libre en el rango
    #[error("no free port on {host} in {base}..{end}")]
    PortUnavailable { host: IpAddr, base: u16, end: u32 },

    /// El puerto estaba libre en el bind de prueba pero el bind real falló
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("session is {0}, start() requires stopped")]
    InvalidState(SessionState),

    #[error("index.html not found in {}", .0.display())]
    MissingIndex(PathBuf),

    #[error("cannot serve {}: {source}", .path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn serve loop thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LauncherError {
    /// Verifica si reintentar `start()` puede funcionar
    pub fn is_port_error(&self) -> bool {
        matches!(
            self,
            LauncherError::PortUnavailable { .. } | LauncherError::Bind { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LauncherError>;
