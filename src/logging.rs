//! # Logging
//! src/logging.rs
//!
//! Instala el subscriber de `tracing`. `RUST_LOG` tiene prioridad sobre la
//! directiva por defecto. Los logs van a stderr; stdout queda para la
//! salida de la consola.

use clap::ValueEnum;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

/// Formato de los logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Legible, para desarrollo
    #[default]
    Pretty,
    /// Una línea JSON por evento
    Json,
}

/// Filtro: `RUST_LOG` si está definido y es válido, si no `default_directive`
fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Instala el subscriber global
///
/// Si ya había uno instalado (ej: otro test) retorna el error y no cambia
/// nada; quien llama decide si le importa.
pub fn init(default_directive: &str, format: LogFormat) -> Result<(), TryInitError> {
    let fmt_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(fmt_layer)
        .try_init()
}
