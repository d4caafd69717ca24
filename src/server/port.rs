//! # Asignación de Puertos
//! src/server/port.rs
//!
//! Busca un puerto libre en `[base, base + range)` sobre una dirección
//! loopback (127.0.0.1 por defecto), en orden ascendente. Para cada
//! candidato se hace un bind de prueba que se libera de inmediato.
//!
//! No se reserva nada: otro proceso puede tomar el puerto entre el bind de
//! prueba y el bind real. Ese caso se reporta como un error de bind normal.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use tracing::trace;

/// Puerto inicial por defecto
pub const DEFAULT_BASE_PORT: u16 = 8000;
/// Cantidad de puertos a probar por defecto
pub const DEFAULT_PORT_RANGE: u16 = 100;

const LISTEN_BACKLOG: i32 = 128;

/// Busca puertos libres dentro de un rango
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortAllocator {
    /// Dirección donde se prueba cada puerto
    host: IpAddr,
    /// Primer puerto (inclusive)
    base_port: u16,
    /// Cantidad de candidatos
    range: u16,
}

impl PortAllocator {
    /// Rango sobre 127.0.0.1
    pub fn new(base_port: u16, range: u16) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            base_port,
            range,
        }
    }

    /// Prueba los puertos sobre `host` en lugar de 127.0.0.1
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    /// Fin del rango (exclusivo); puede valer 65536
    pub fn end(&self) -> u32 {
        (u32::from(self.base_port) + u32::from(self.range)).min(u32::from(u16::MAX) + 1)
    }

    /// Verifica si `port` pertenece al rango
    pub fn contains(&self, port: u16) -> bool {
        port != 0 && u32::from(port) >= u32::from(self.base_port) && u32::from(port) < self.end()
    }

    /// Candidatos en orden ascendente. El puerto 0 nunca es candidato.
    pub fn candidates(&self) -> impl Iterator<Item = u16> {
        let start = u32::from(self.base_port.max(1));
        (start..self.end()).filter_map(|port| u16::try_from(port).ok())
    }

    /// Primer puerto del rango donde un bind de prueba funciona
    pub fn find_available(&self) -> Option<u16> {
        self.candidates().find(|&port| self.is_available(port))
    }

    /// Hace un bind de prueba en `host:port` y lo libera
    pub fn is_available(&self, port: u16) -> bool {
        match bind_listener(SocketAddr::new(self.host, port)) {
            Ok(_listener) => {
                trace!(port, "port available");
                true
            }
            Err(err) => {
                trace!(port, error = %err, "port unavailable");
                false
            }
        }
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_PORT, DEFAULT_PORT_RANGE)
    }
}

/// Atajo de [`PortAllocator::find_available`]
///
/// # Ejemplo
/// ```no_run
/// use html_launcher::server::find_available_port;
///
/// match find_available_port(8000, 100) {
///     Some(port) => println!("libre: {port}"),
///     None => println!("rango agotado"),
/// }
/// ```
pub fn find_available_port(base_port: u16, range: u16) -> Option<u16> {
    PortAllocator::new(base_port, range).find_available()
}

/// Dirección `127.0.0.1:port`
pub fn loopback(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

/// Crea un listener en `addr`
///
/// Se usa tanto para el bind de prueba como para el bind real, así ambos
/// ven las mismas opciones de socket. `SO_REUSEADDR` permite re-usar un
/// puerto en TIME_WAIT; en Windows esa opción permite robar puertos, así
/// que no se activa.
pub(crate) fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    #[cfg(unix)]
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}
