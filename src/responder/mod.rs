//! # Responders
//! src/responder/mod.rs
//!
//! El serve loop no sabe nada de archivos: le entrega cada request a un
//! [`Responder`] y escribe lo que este devuelva.
//!
//! ```text
//! Request → Responder → Response
//! ```
//!
//! La implementación real es [`StaticFileResponder`]; los tests usan
//! responders propios (lentos, que hacen panic, etc.).

pub mod mime;
pub mod static_files;

pub use static_files::StaticFileResponder;

use crate::http::{Request, Response};

/// Valor del header `Server` en todas las respuestas
pub const SERVER_NAME: &str = "html-launcher";

/// Genera una respuesta para un request ya parseado
///
/// Se llama desde el thread del serve loop, un request a la vez.
pub trait Responder: Send + Sync {
    fn respond(&self, request: &Request) -> Response;
}

impl<F> Responder for F
where
    F: Fn(&Request) -> Response + Send + Sync,
{
    fn respond(&self, request: &Request) -> Response {
        self(request)
    }
}

/// Agrega los headers comunes a todas las respuestas
pub fn add_common_headers(response: &mut Response) {
    response.add_header("Server", SERVER_NAME);
    response.add_header("Connection", "close");
}
