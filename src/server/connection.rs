//! # Manejo de una Conexión
//! src/server/connection.rs
//!
//! Lee un request, lo pasa al responder y escribe la respuesta. Una
//! conexión = un request (HTTP/1.0, `Connection: close`).
//!
//! Un panic del responder se aísla al request: el cliente recibe un 500,
//! se publica un `Warning` y el serve loop sigue atendiendo.

use crate::events::{EventSender, LogEvent};
use crate::http::{Method, ParseError, Request, Response, StatusCode};
use crate::metrics::MetricsCollector;
use crate::responder::{add_common_headers, Responder};
use std::any::Any;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Tamaño máximo de request line + headers
pub const MAX_REQUEST_SIZE: usize = 8192;

/// Lee hasta el fin de los headers (`\r\n\r\n`), EOF o [`MAX_REQUEST_SIZE`]
fn read_request_head(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= MAX_REQUEST_SIZE {
            break;
        }
    }

    buffer.truncate(MAX_REQUEST_SIZE);
    Ok(buffer)
}

/// Respuesta para un request que no se pudo parsear
fn parse_error_response(err: &ParseError) -> Response {
    let mut response = match err {
        ParseError::UnsupportedMethod(_) => {
            Response::error(StatusCode::MethodNotAllowed, &err.to_string())
                .with_header("Allow", "GET, HEAD")
        }
        _ => Response::error(StatusCode::BadRequest, &err.to_string()),
    };
    add_common_headers(&mut response);
    response
}

/// Mensaje de un panic (`&str` o `String`)
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Llama al responder aislando un posible panic
fn dispatch(
    responder: &dyn Responder,
    request: &Request,
    label: &str,
    events: &EventSender,
) -> Response {
    match panic::catch_unwind(AssertUnwindSafe(|| responder.respond(request))) {
        Ok(response) => response,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            events.publish(LogEvent::warning(format!(
                "responder panicked on \"{label}\": {message}"
            )));
            let mut response =
                Response::error(StatusCode::InternalServerError, "Internal server error");
            if request.method() == Method::HEAD {
                response = response.without_body();
            }
            add_common_headers(&mut response);
            response
        }
    }
}

/// Atiende una conexión completa
///
/// Los errores de I/O se devuelven al serve loop, que los registra y
/// sigue con la próxima conexión.
pub fn handle_connection(
    mut stream: TcpStream,
    responder: &dyn Responder,
    metrics: &MetricsCollector,
    events: &EventSender,
    io_timeout: Duration,
) -> io::Result<()> {
    let start = Instant::now();
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    stream.set_read_timeout(Some(io_timeout))?;
    stream.set_write_timeout(Some(io_timeout))?;

    let buffer = read_request_head(&mut stream)?;
    if buffer.is_empty() {
        // El cliente cerró sin enviar nada
        return Ok(());
    }

    let (response, label, user_agent) = match Request::parse(&buffer) {
        Ok(request) => {
            let label = format!(
                "{} {} {}",
                request.method().as_str(),
                request.raw_path(),
                request.version()
            );
            let response = dispatch(responder, &request, &label, events);
            let user_agent = request.header("User-Agent").unwrap_or("-").to_string();
            (response, label, user_agent)
        }
        Err(err) => (
            parse_error_response(&err),
            format!("<invalid: {err}>"),
            "-".to_string(),
        ),
    };

    stream.write_all(&response.to_bytes())?;
    stream.flush()?;

    let latency = start.elapsed();
    metrics.record_request(response.status().as_u16(), latency);
    events.publish(LogEvent::debug(format!(
        "{peer} \"{label}\" -> {} ({:.2}ms) \"{user_agent}\"",
        response.status(),
        latency.as_secs_f64() * 1000.0
    )));

    Ok(())
}
