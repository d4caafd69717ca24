//! Tests de integración del launcher
//! tests/integration_test.rs
//!
//! Cada test levanta su propia sesión sobre un directorio temporal y le
//! habla por TCP real en 127.0.0.1. Los puertos base salen de puertos
//! efímeros para no chocar con nada que corra en la máquina.

use html_launcher::error::LauncherError;
use html_launcher::events::{event_channel, EventReceiver, LogEvent, Severity};
use html_launcher::http::{Request, Response, StatusCode};
use html_launcher::responder::Responder;
use html_launcher::server::{
    find_available_port, PortAllocator, PortRequest, ServerSession, SessionConfig, SessionState,
    ShutdownOutcome,
};
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const INDEX: &str = "<!DOCTYPE html><h1>Launcher</h1>";

/// Helper: directorio con index.html y algunos archivos más
fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), INDEX).unwrap();
    fs::write(dir.path().join("app.js"), "console.log(1);").unwrap();
    fs::create_dir(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs").join("guia.html"), "guia").unwrap();
    dir
}

/// Helper: puerto efímero recién liberado
fn ephemeral_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn config() -> SessionConfig {
    SessionConfig {
        base_port: ephemeral_port(),
        port_range: 50,
        shutdown_timeout: Duration::from_secs(2),
        io_timeout: Duration::from_secs(2),
        ..SessionConfig::default()
    }
}

fn start_session(dir: &TempDir, config: SessionConfig) -> (ServerSession, EventReceiver, u16) {
    let (events, receiver) = event_channel(256);
    let mut session = ServerSession::new(dir.path(), config, events).unwrap();
    let port = session.start(PortRequest::Auto).unwrap();
    (session, receiver, port)
}

/// Helper: envía un request crudo y retorna la response completa
fn send_raw(port: u16, raw: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let mut stream = TcpStream::connect(("127.0.0.1", port))?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;

    stream.write_all(raw.as_bytes())?;
    stream.flush()?;

    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    Ok(response)
}

fn send_request(port: u16, method: &str, path: &str) -> String {
    send_raw(port, &format!("{method} {path} HTTP/1.0\r\n\r\n")).expect("Failed to send request")
}

/// Helper: extrae el body de una response HTTP
fn extract_body(response: &str) -> &str {
    match response.find("\r\n\r\n") {
        Some(pos) => &response[pos + 4..],
        None => "",
    }
}

fn transitions(events: &[LogEvent]) -> Vec<SessionState> {
    events.iter().filter_map(|e| e.state).collect()
}

/// Espera hasta que `condition` se cumpla o pase `timeout`
fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Responder que avisa cuando empieza y tarda `delay` en contestar
struct SlowResponder {
    delay: Duration,
    entered: Arc<AtomicBool>,
}

impl Responder for SlowResponder {
    fn respond(&self, _request: &Request) -> Response {
        self.entered.store(true, Ordering::SeqCst);
        thread::sleep(self.delay);
        Response::new(StatusCode::Ok).with_body("lento")
    }
}

fn slow_session(
    dir: &TempDir,
    delay: Duration,
    shutdown_timeout: Duration,
) -> (ServerSession, EventReceiver, Arc<AtomicBool>) {
    let entered = Arc::new(AtomicBool::new(false));
    let responder = Arc::new(SlowResponder {
        delay,
        entered: Arc::clone(&entered),
    });
    let (events, receiver) = event_channel(256);
    let config = SessionConfig {
        shutdown_timeout,
        ..config()
    };
    let session = ServerSession::with_responder(dir.path(), config, events, responder).unwrap();
    (session, receiver, entered)
}

// ==================== Port Allocator ====================

#[test]
fn test_occupied_base_port_is_skipped() {
    // Escenario A con un puerto base efímero ocupado
    let held = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = held.local_addr().unwrap().port();

    let allocator = PortAllocator::new(base, 100);
    assert!(!allocator.is_available(base));

    let found = find_available_port(base, 100);
    let first_free = allocator.candidates().find(|&p| allocator.is_available(p));
    assert!(found.is_some(), "no free port in {base}..{}", allocator.end());
    assert_eq!(found, first_free);
    assert!(found.is_some_and(|port| port > base && allocator.contains(port)));
}

#[test]
fn test_session_skips_occupied_base_port() {
    let dir = site();
    let held = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = held.local_addr().unwrap().port();

    let (events, _receiver) = event_channel(64);
    let config = SessionConfig {
        base_port: base,
        port_range: 100,
        ..config()
    };
    let mut session = ServerSession::new(dir.path(), config, events).unwrap();
    let expected = find_available_port(base, 100).expect("a free port above the held one");

    let port = session.start(PortRequest::Auto).unwrap();
    assert_eq!(port, expected);
    assert_ne!(port, base);
    assert_eq!(session.bound_port(), Some(port));
    assert!(send_request(port, "GET", "/").contains("200 OK"));
}

#[test]
fn test_exhausted_range_reports_port_unavailable() {
    // Escenario D: ocupar todo un rango chico
    let base = ephemeral_port();
    let held: Vec<TcpListener> = (base..base.saturating_add(3))
        .filter_map(|port| TcpListener::bind(("127.0.0.1", port)).ok())
        .collect();

    let dir = site();
    let (events, receiver) = event_channel(64);
    let config = SessionConfig {
        base_port: base,
        port_range: 3,
        ..config()
    };
    let mut session = ServerSession::new(dir.path(), config, events).unwrap();

    let err = session.start(PortRequest::Auto).unwrap_err();
    assert!(matches!(err, LauncherError::PortUnavailable { .. }), "{err}");
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(session.bound_port(), None);

    let events = receiver.drain();
    assert_eq!(
        transitions(&events),
        vec![SessionState::Starting, SessionState::Stopped]
    );
    assert_eq!(events.last().unwrap().severity, Severity::Error);
    drop(held);
}

// ==================== Servir archivos ====================

#[test]
fn test_get_index_html() {
    // Escenario B
    let dir = site();
    let (mut session, _receiver, port) = start_session(&dir, config());

    let response = send_request(port, "GET", "/index.html");
    assert!(response.starts_with("HTTP/1.0 200 OK\r\n"), "got: {response}");
    assert!(response.contains("Content-Type: text/html"));
    assert!(response.contains("Server: html-launcher\r\n"));
    assert_eq!(extract_body(&response), INDEX);

    // `/` sirve el mismo index
    assert_eq!(extract_body(&send_request(port, "GET", "/")), INDEX);

    session.stop();
}

#[test]
fn test_head_has_no_body() {
    let dir = site();
    let (_session, _receiver, port) = start_session(&dir, config());

    let response = send_request(port, "HEAD", "/index.html");
    assert!(response.starts_with("HTTP/1.0 200 OK"));
    assert!(response.contains(&format!("Content-Length: {}", INDEX.len())));
    assert_eq!(extract_body(&response), "");
}

#[test]
fn test_not_found_and_traversal() {
    let dir = site();
    let (_session, _receiver, port) = start_session(&dir, config());

    assert!(send_request(port, "GET", "/no-existe.html").contains("404 Not Found"));
    assert!(send_request(port, "GET", "/../../etc/passwd").contains("403 Forbidden"));
    assert!(send_request(port, "GET", "/docs/%2e%2e/%2e%2e/etc/passwd").contains("403 Forbidden"));
}

#[test]
fn test_directory_redirect_and_listing() {
    let dir = site();
    let (_session, _receiver, port) = start_session(&dir, config());

    let redirect = send_request(port, "GET", "/docs");
    assert!(redirect.contains("301 Moved Permanently"));
    assert!(redirect.contains("Location: /docs/\r\n"));

    let listing = send_request(port, "GET", "/docs/");
    assert!(listing.contains("200 OK"));
    assert!(listing.contains("guia.html"));
}

#[test]
fn test_unsupported_method_and_bad_request() {
    let dir = site();
    let (mut session, _receiver, port) = start_session(&dir, config());

    assert!(send_request(port, "POST", "/").contains("405 Method Not Allowed"));
    assert!(send_raw(port, "basura\r\n\r\n").unwrap().contains("400 Bad Request"));

    // El servidor sigue atendiendo
    assert!(send_request(port, "GET", "/app.js").contains("200 OK"));
    let metrics = session.metrics();
    assert_eq!(metrics.total_requests, 3);
    assert_eq!(metrics.status_codes.get(&200), Some(&1));

    assert_eq!(session.stop(), Some(ShutdownOutcome::Terminated));
}

// ==================== Ciclo de vida ====================

#[test]
fn test_start_then_stop_within_timeout() {
    let dir = site();
    let (mut session, receiver, _port) = start_session(&dir, config());

    let started = Instant::now();
    let outcome = session.stop();
    assert_eq!(outcome, Some(ShutdownOutcome::Terminated));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(session.state(), SessionState::Stopped);

    assert_eq!(
        transitions(&receiver.drain()),
        vec![
            SessionState::Starting,
            SessionState::Running,
            SessionState::Stopping,
            SessionState::Stopped,
        ]
    );
}

#[test]
fn test_stop_is_idempotent() {
    let dir = site();
    let (mut session, receiver, _port) = start_session(&dir, config());

    assert!(session.stop().is_some());
    receiver.drain();

    assert_eq!(session.stop(), None);
    assert_eq!(session.stop(), None);
    assert!(receiver.drain().is_empty());
    assert_eq!(session.state(), SessionState::Stopped);
}

#[test]
fn test_second_start_is_rejected() {
    let dir = site();
    let (mut session, receiver, port) = start_session(&dir, config());
    receiver.drain();

    let err = session.start(PortRequest::Auto).unwrap_err();
    assert!(matches!(err, LauncherError::InvalidState(SessionState::Running)));
    assert_eq!(session.bound_port(), Some(port));
    assert!(receiver.drain().is_empty());
}

#[test]
fn test_port_released_after_stop() {
    let dir = site();
    let (mut session, _receiver, port) = start_session(&dir, config());

    session.stop();
    let addr = ([127, 0, 0, 1], port).into();
    assert!(TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_err());

    // Un nuevo start puede volver a usar el mismo puerto
    assert_eq!(session.start(PortRequest::Specific(port)).unwrap(), port);
}

#[test]
fn test_specific_port() {
    let dir = site();
    let (events, _receiver) = event_channel(64);
    let mut session = ServerSession::new(dir.path(), config(), events).unwrap();

    let wanted = ephemeral_port();
    let port = session.start(PortRequest::Specific(wanted)).unwrap();
    assert!(port >= wanted);
    assert!(send_request(port, "GET", "/").contains("200 OK"));
}

#[test]
fn test_events_are_ordered() {
    let dir = site();
    let (mut session, receiver, port) = start_session(&dir, config());

    send_request(port, "GET", "/");
    send_request(port, "GET", "/app.js");
    session.stop();

    let events = receiver.drain();
    for pair in events.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }

    // Los requests quedan entre Running y Stopping
    let requests: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.severity == Severity::Debug)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(requests.len(), 2);
    assert_eq!(events[requests[0] - 1].state, Some(SessionState::Running));
    assert_eq!(events[requests[1] + 1].state, Some(SessionState::Stopping));
}

// ==================== Shutdown con requests en curso ====================

#[test]
fn test_stop_during_slow_request_is_bounded() {
    // Escenario C: el request tarda más que el timeout
    let dir = site();
    let (mut session, receiver, entered) =
        slow_session(&dir, Duration::from_secs(3), Duration::from_millis(300));
    let port = session.start(PortRequest::Auto).unwrap();

    let client = thread::spawn(move || send_raw(port, "GET / HTTP/1.0\r\n\r\n"));
    assert!(wait_for(Duration::from_secs(2), || entered.load(Ordering::SeqCst)));

    let started = Instant::now();
    let outcome = session.stop();
    let elapsed = started.elapsed();

    assert_eq!(outcome, Some(ShutdownOutcome::ForcedAbandon));
    assert!(elapsed < Duration::from_millis(1500), "stop took {elapsed:?}");
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(session.bound_port(), None);

    let events = receiver.drain();
    let last = events.iter().rev().find(|e| e.is_transition()).unwrap();
    assert_eq!(last.state, Some(SessionState::Stopped));
    assert_eq!(last.severity, Severity::Warning);

    // El request abandonado igual termina en segundo plano
    let response = client.join().unwrap().unwrap();
    assert!(response.contains("200 OK"));

    // El serve loop abandonado no publica un segundo Stopped
    assert!(receiver.drain().iter().all(|e| !e.is_transition()));
}

#[test]
fn test_stop_waits_for_short_request() {
    let dir = site();
    let (mut session, _receiver, entered) =
        slow_session(&dir, Duration::from_millis(200), Duration::from_secs(2));
    let port = session.start(PortRequest::Auto).unwrap();

    let client = thread::spawn(move || send_raw(port, "GET / HTTP/1.0\r\n\r\n"));
    assert!(wait_for(Duration::from_secs(2), || entered.load(Ordering::SeqCst)));

    assert_eq!(session.stop(), Some(ShutdownOutcome::Terminated));
    let response = client.join().unwrap().unwrap();
    assert_eq!(extract_body(&response), "lento");
}

#[test]
fn test_restart_after_forced_abandon() {
    let dir = site();
    let (mut session, receiver, entered) =
        slow_session(&dir, Duration::from_secs(2), Duration::from_millis(200));
    let port = session.start(PortRequest::Auto).unwrap();

    let _client = thread::spawn(move || send_raw(port, "GET / HTTP/1.0\r\n\r\n"));
    assert!(wait_for(Duration::from_secs(2), || entered.load(Ordering::SeqCst)));
    assert_eq!(session.stop(), Some(ShutdownOutcome::ForcedAbandon));

    // Nueva generación; la salida tardía del loop anterior no la toca
    let new_port = session.start(PortRequest::Auto).unwrap();
    thread::sleep(Duration::from_millis(2500));
    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(session.bound_port(), Some(new_port));

    // El request abandonado ya terminó y no cuenta en la nueva ejecución
    let metrics = session.metrics();
    assert_eq!(metrics.total_requests, 0);
    assert!(metrics.status_codes.is_empty());

    assert!(send_request(new_port, "GET", "/").contains("200 OK"));
    assert_eq!(session.metrics().total_requests, 1);

    session.stop();
    let states = transitions(&receiver.drain());
    assert_eq!(states.last(), Some(&SessionState::Stopped));
}

// ==================== Fallas del responder ====================

#[test]
fn test_panicking_responder_keeps_serving() {
    let dir = site();
    let (events, receiver) = event_channel(64);
    let responder: Arc<dyn Responder> = Arc::new(|request: &Request| -> Response {
        if request.path() == "/boom" {
            panic!("responder exploded");
        }
        Response::new(StatusCode::Ok).with_body("ok")
    });
    let mut session =
        ServerSession::with_responder(dir.path(), config(), events, responder).unwrap();
    let port = session.start(PortRequest::Auto).unwrap();
    receiver.drain();

    let response = send_raw(port, "GET /boom HTTP/1.0\r\n\r\n").unwrap();
    assert!(response.starts_with("HTTP/1.0 500 Internal Server Error"), "{response}");

    // El panic queda en el request: la sesión sigue en Running
    assert_eq!(session.state(), SessionState::Running);
    assert_eq!(session.bound_port(), Some(port));
    let response = send_request(port, "GET", "/");
    assert!(response.contains("200 OK"));
    assert_eq!(extract_body(&response), "ok");

    let events = receiver.drain();
    assert!(events.iter().all(|e| !e.is_transition()));
    let warning = events
        .iter()
        .find(|e| e.severity == Severity::Warning)
        .expect("warning for the panic");
    assert!(warning.message.contains("GET /boom"));
    assert!(warning.message.contains("responder exploded"));

    let metrics = session.metrics();
    assert_eq!(metrics.status_codes.get(&500), Some(&1));
    assert_eq!(metrics.status_codes.get(&200), Some(&1));

    assert_eq!(session.stop(), Some(ShutdownOutcome::Terminated));
}

#[test]
fn test_missing_index_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (events, receiver) = event_channel(16);
    let mut session = ServerSession::new(dir.path(), config(), events).unwrap();

    let err = session.start(PortRequest::Auto).unwrap_err();
    assert!(matches!(err, LauncherError::MissingIndex(_)));

    let events = receiver.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::Error);
    assert!(events[0].message.contains("index.html"));
    assert_eq!(session.state(), SessionState::Stopped);
}
