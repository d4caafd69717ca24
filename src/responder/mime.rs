//! Content-Type a partir de la extensión del archivo.
//!
//! Lista tomada de
//! <https://developer.mozilla.org/en-US/docs/Web/HTTP/Guides/MIME_types/Common_types>.
//! No es exhaustiva; lo desconocido se sirve como `application/octet-stream`.

use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Devuelve el Content-Type para `path` según su extensión
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",
        Some("csv") => "text/csv; charset=utf-8",
        Some("wasm") => "application/wasm",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(content_type(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("viejo.htm")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("app.mjs")), "text/javascript; charset=utf-8");
        assert_eq!(content_type(Path::new("foto.JPG")), "image/jpeg");
    }

    #[test]
    fn test_unknown_or_missing_extension() {
        assert_eq!(content_type(Path::new("Makefile")), OCTET_STREAM);
        assert_eq!(content_type(Path::new("datos.xyz")), OCTET_STREAM);
    }
}
