//! # Consola
//! src/console.rs
//!
//! Interfaz de terminal sobre una [`ServerSession`]:
//!
//! - arranca el servidor al iniciar
//! - cada `poll_interval` retira los eventos pendientes y los imprime
//! - con `--interactive` lee comandos de stdin (`start`, `stop`, `status`,
//!   `quit`)
//! - con SIGINT/SIGTERM (unix) detiene el servidor antes de salir
//!
//! La consola es el único consumidor del canal de eventos.

use crate::config::Config;
use crate::error::{LauncherError, Result};
use crate::events::{event_channel, EventReceiver, LogEvent};
use crate::server::{PortRequest, ServerSession, SessionState, StatusSnapshot};
use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Comandos de la consola interactiva
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Status,
    Help,
    Quit,
}

impl Command {
    /// Parsea una línea de stdin (sin distinguir mayúsculas)
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_lowercase().as_str() {
            "start" | "s" => Some(Command::Start),
            "stop" | "x" => Some(Command::Stop),
            "status" | "st" => Some(Command::Status),
            "help" | "h" | "?" => Some(Command::Help),
            "quit" | "exit" | "q" => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Consola sobre una sesión
pub struct Console {
    session: ServerSession,
    receiver: EventReceiver,
    port_request: PortRequest,
    json: bool,
}

impl Console {
    pub fn new(
        session: ServerSession,
        receiver: EventReceiver,
        port_request: PortRequest,
        json: bool,
    ) -> Self {
        Self {
            session,
            receiver,
            port_request,
            json,
        }
    }

    pub fn session(&self) -> &ServerSession {
        &self.session
    }

    /// Imprime todos los eventos pendientes; retorna cuántos había
    pub fn flush_events(&self) -> usize {
        let events = self.receiver.drain();
        for event in &events {
            self.print_event(event);
        }
        events.len()
    }

    fn print_event(&self, event: &LogEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(err) => warn!(error = %err, "failed to serialize event"),
            }
        } else {
            println!("{event}");
        }
    }

    /// Ejecuta un comando; retorna `false` si la consola debe terminar
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Start => {
                if let Err(err) = self.session.start(self.port_request) {
                    // El evento de error ya quedó en el canal
                    debug!(error = %err, "start command failed");
                }
            }
            Command::Stop => {
                if self.session.stop().is_none() {
                    println!("server is not running");
                }
            }
            Command::Status => self.print_status(),
            Command::Help => print_help(),
            Command::Quit => return false,
        }
        true
    }

    pub fn print_status(&self) {
        let status = self.session.status();
        if self.json {
            match serde_json::to_string(&status) {
                Ok(line) => println!("{line}"),
                Err(err) => warn!(error = %err, "failed to serialize status"),
            }
        } else {
            print_status_table(&status);
        }
    }

    /// Detiene el servidor (si corre) e imprime los últimos eventos
    pub fn shutdown(&mut self) {
        self.session.stop();
        self.flush_events();
        let dropped = self.receiver.dropped();
        if dropped > 0 {
            println!("({dropped} events dropped: queue was full)");
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("   start    start the server");
    println!("   stop     stop the server");
    println!("   status   show server status");
    println!("   quit     stop the server and exit");
}

fn print_status_table(status: &StatusSnapshot) {
    let requests = &status.requests;
    println!("┌──────────────────────────────────────────────────────────────");
    println!("│ State:     {}", status.state);
    match &status.url {
        Some(url) => println!("│ URL:       {url}"),
        None => println!("│ URL:       -"),
    }
    println!("│ Root:      {}", status.root.display());
    if status.html_files.is_empty() {
        println!("│ HTML:      (none)");
    } else {
        println!("│ HTML:      {}", status.html_files.join(", "));
    }
    println!(
        "│ Requests:  {} total, {} failed connections",
        requests.total_requests, requests.failed_connections
    );
    for (code, count) in &requests.status_codes {
        println!("│            {code}: {count}");
    }
    println!(
        "│ Latency:   p50 {}µs, p95 {}µs, p99 {}µs",
        requests.latency_p50_us, requests.latency_p95_us, requests.latency_p99_us
    );
    println!("└──────────────────────────────────────────────────────────────");
}

/// Thread que lee comandos de stdin; EOF equivale a `quit`
fn spawn_stdin_reader() -> io::Result<Receiver<Command>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("console-stdin".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse(&line) {
                    Some(command) => {
                        if tx.send(command).is_err() {
                            return;
                        }
                    }
                    None => println!("unknown command: {} (try 'help')", line.trim()),
                }
            }
            let _ = tx.send(Command::Quit);
        })?;
    Ok(rx)
}

/// Registra SIGINT y SIGTERM sobre `flag`
#[cfg(unix)]
fn register_signals(flag: &Arc<AtomicBool>) {
    use signal_hook::consts::{SIGINT, SIGTERM};

    for signal in [SIGINT, SIGTERM] {
        if let Err(err) = signal_hook::flag::register(signal, Arc::clone(flag)) {
            warn!(signal, error = %err, "failed to register signal handler");
        }
    }
}

#[cfg(not(unix))]
fn register_signals(_flag: &Arc<AtomicBool>) {}

/// Corre la consola hasta `quit`, una señal o (sin `--interactive`) hasta
/// que el servidor se detenga solo.
pub fn run(config: &Config) -> Result<()> {
    let root = config.root_dir().map_err(|source| LauncherError::Root {
        path: config.root.clone().unwrap_or_default(),
        source,
    })?;
    let (events, receiver) = event_channel(config.event_capacity);
    let session = ServerSession::new(&root, config.session_config(), events)?;
    let mut console = Console::new(session, receiver, config.port_request(), config.json);

    let terminate = Arc::new(AtomicBool::new(false));
    register_signals(&terminate);

    let commands = if config.interactive {
        Some(spawn_stdin_reader().map_err(LauncherError::Spawn)?)
    } else {
        None
    };

    let started = console.session.start(console.port_request);
    console.flush_events();
    if let Err(err) = started {
        if !config.interactive {
            return Err(err);
        }
    }
    if config.interactive {
        print_help();
    }

    run_loop(&mut console, commands.as_ref(), &terminate, config.poll_interval());

    console.shutdown();
    Ok(())
}

fn run_loop(
    console: &mut Console,
    commands: Option<&Receiver<Command>>,
    terminate: &AtomicBool,
    poll_interval: Duration,
) {
    loop {
        thread::sleep(poll_interval);
        console.flush_events();

        if terminate.load(Ordering::Relaxed) {
            println!("signal received, stopping");
            return;
        }

        match commands {
            Some(commands) => loop {
                match commands.try_recv() {
                    Ok(command) => {
                        if !console.handle(command) {
                            return;
                        }
                        console.flush_events();
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            },
            // Sin comandos no hay forma de re-arrancar
            None => {
                if console.session.state() == SessionState::Stopped {
                    return;
                }
            }
        }
    }
}
