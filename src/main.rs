//! # HTML Launcher - Entry Point
//! src/main.rs
//!
//! Punto de entrada del launcher: parsea la configuración, instala el
//! logging y corre la consola hasta `quit` o una señal.

use html_launcher::config::Config;
use html_launcher::console;
use html_launcher::error::LauncherError;
use html_launcher::logging;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Crear configuración (CLI + variables de entorno)
    let config = Config::new();

    if let Err(err) = logging::init("html_launcher=info", config.log_format) {
        eprintln!("logging already initialized: {err}");
    }

    if let Err(msg) = config.validate() {
        eprintln!("💥 {}", LauncherError::Config(msg));
        return ExitCode::from(2);
    }

    if !config.json {
        println!("=================================");
        println!("  HTML Launcher");
        println!("=================================\n");
        config.print_summary();
    }

    match console::run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("💥 Error: {err}");
            if err.is_port_error() {
                ExitCode::from(3)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
