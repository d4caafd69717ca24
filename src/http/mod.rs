//! # Módulo HTTP
//!
//! Subconjunto mínimo de HTTP/1.0 (RFC 1945) que necesita el responder
//! de archivos estáticos:
//!
//! - Parsing de la request line y headers (`GET` y `HEAD`)
//! - Construcción de responses
//! - Códigos de estado
//!
//! Todas las respuestas son HTTP/1.0 con `Connection: close`: una
//! conexión, un request.

pub mod request;
pub mod response;
pub mod status;

pub use request::{Method, ParseError, Request};
pub use response::{escape_html, Response};
pub use status::StatusCode;
