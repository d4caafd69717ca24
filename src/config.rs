//! # Configuración del Launcher
//! src/config.rs
//!
//! Configuración con soporte para argumentos CLI y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./html-launcher --root ./sitio \
//!   --base-port 8000 \
//!   --port-range 100 \
//!   --shutdown-timeout-ms 2000 \
//!   --interactive
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! LAUNCHER_PORT=8080 LAUNCHER_ROOT=./sitio ./html-launcher
//! ```

use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::logging::LogFormat;
use crate::server::{
    PortRequest, SessionConfig, DEFAULT_BASE_PORT, DEFAULT_IO_TIMEOUT, DEFAULT_PORT_RANGE,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
use clap::Parser;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Configuración del launcher
#[derive(Debug, Clone, Parser)]
#[command(name = "html-launcher")]
#[command(about = "Sirve index.html desde un directorio en un servidor HTTP local")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto preferido; si está ocupado se busca el siguiente libre
    #[arg(short, long, env = "LAUNCHER_PORT")]
    pub port: Option<u16>,

    /// Primer puerto a probar cuando no se indica `--port`
    #[arg(long = "base-port", default_value = "8000", env = "LAUNCHER_BASE_PORT")]
    pub base_port: u16,

    /// Cantidad de puertos a probar
    #[arg(long = "port-range", default_value = "100", env = "LAUNCHER_PORT_RANGE")]
    pub port_range: u16,

    /// Host/IP (solo loopback; `localhost` = 127.0.0.1)
    #[arg(long, default_value = "127.0.0.1", env = "LAUNCHER_HOST", value_parser = parse_host)]
    pub host: IpAddr,

    /// Directorio a servir (por defecto el directorio actual)
    #[arg(long, env = "LAUNCHER_ROOT")]
    pub root: Option<PathBuf>,

    // === Timeouts ===

    /// Cuánto esperar al serve loop al detener, en milisegundos
    #[arg(
        long = "shutdown-timeout-ms",
        default_value = "2000",
        env = "LAUNCHER_SHUTDOWN_TIMEOUT_MS"
    )]
    pub shutdown_timeout_ms: u64,

    /// Timeout de lectura/escritura por conexión, en milisegundos
    #[arg(long = "io-timeout-ms", default_value = "5000", env = "LAUNCHER_IO_TIMEOUT_MS")]
    pub io_timeout_ms: u64,

    // === Consola ===

    /// Cada cuánto se leen los eventos pendientes, en milisegundos
    #[arg(long = "poll-interval-ms", default_value = "200", env = "LAUNCHER_POLL_INTERVAL_MS")]
    pub poll_interval_ms: u64,

    /// Capacidad del canal de eventos
    #[arg(long = "event-capacity", default_value = "1024", env = "LAUNCHER_EVENT_CAPACITY")]
    pub event_capacity: usize,

    /// Arrancar aunque no exista index.html
    #[arg(long = "no-index-check")]
    pub no_index_check: bool,

    /// Leer comandos (start, stop, status, quit) de stdin
    #[arg(long)]
    pub interactive: bool,

    /// Imprimir eventos y status como JSON (una línea por objeto)
    #[arg(long)]
    pub json: bool,

    /// Formato de los logs de tracing
    #[arg(long = "log-format", value_enum, default_value = "pretty", env = "LAUNCHER_LOG_FORMAT")]
    pub log_format: LogFormat,
}

/// `localhost` o una IP literal
fn parse_host(s: &str) -> Result<IpAddr, String> {
    if s.eq_ignore_ascii_case("localhost") {
        return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    s.parse::<IpAddr>()
        .map_err(|_| format!("expected an IP address or localhost, got {s}"))
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        // Validar puertos
        if self.port == Some(0) {
            return Err("Port must be >= 1".to_string());
        }
        if self.port_range == 0 {
            return Err("Port range must be >= 1".to_string());
        }

        // Validar host
        if !self.host.is_loopback() {
            return Err(format!("Host must be a loopback address, got {}", self.host));
        }

        // Validar timeouts
        if self.shutdown_timeout_ms == 0 {
            return Err("Shutdown timeout must be > 0".to_string());
        }
        if self.io_timeout_ms == 0 {
            return Err("IO timeout must be > 0".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("Poll interval must be > 0".to_string());
        }

        if self.event_capacity == 0 {
            return Err("Event capacity must be >= 1".to_string());
        }

        Ok(())
    }

    /// Directorio a servir: `--root` o el directorio actual
    pub fn root_dir(&self) -> io::Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir(),
        }
    }

    /// Puerto a pedir en `start()`
    pub fn port_request(&self) -> PortRequest {
        match self.port {
            Some(port) => PortRequest::Specific(port),
            None => PortRequest::Auto,
        }
    }

    /// Parámetros para `ServerSession`
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            host: self.host,
            base_port: self.base_port,
            port_range: self.port_range,
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
            io_timeout: Duration::from_millis(self.io_timeout_ms),
            require_index: !self.no_index_check,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Imprime un resumen de la configuración
    pub fn print_summary(&self) {
        let root = self
            .root_dir()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|err| format!("<{err}>"));
        let port = match self.port {
            Some(port) => format!("{port} (preferred)"),
            None => "auto".to_string(),
        };

        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║                HTML Launcher Configuration                   ║");
        println!("╚══════════════════════════════════════════════════════════════╝");
        println!();
        println!("🌐 Network:");
        println!("   Host:         {}", self.host);
        println!("   Port:         {port}");
        println!(
            "   Search:       {}..{}",
            self.base_port,
            u32::from(self.base_port) + u32::from(self.port_range)
        );
        println!();
        println!("📁 Content:");
        println!("   Root:         {root}");
        println!(
            "   Index check:  {}",
            if self.no_index_check {
                "disabled"
            } else {
                "index.html required"
            }
        );
        println!();
        println!("⏱️  Timeouts:");
        println!("   Shutdown:     {} ms", self.shutdown_timeout_ms);
        println!("   I/O:          {} ms", self.io_timeout_ms);
        println!("   Poll:         {} ms", self.poll_interval_ms);
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!();
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: None,
            base_port: DEFAULT_BASE_PORT,
            port_range: DEFAULT_PORT_RANGE,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            root: None,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64,
            io_timeout_ms: DEFAULT_IO_TIMEOUT.as_millis() as u64,
            poll_interval_ms: 200,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            no_index_check: false,
            interactive: false,
            json: false,
            log_format: LogFormat::Pretty,
        }
    }
}
