//! # Responder de Archivos Estáticos
//! src/responder/static_files.rs
//!
//! Sirve archivos desde un directorio raíz:
//!
//! - `/` o un directorio → `index.html` (o `index.htm`) si existe, si no
//!   un listado HTML del directorio
//! - directorio sin `/` final → 301 al mismo path con `/`
//! - cualquier path que salga de la raíz (`..`, symlinks) → 403
//! - `HEAD` → mismos headers que `GET`, sin body

use super::{add_common_headers, mime, Responder};
use crate::http::{escape_html, Method, Request, Response, StatusCode};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};

/// Archivos que se sirven al pedir un directorio, en orden de preferencia
pub const INDEX_FILES: [&str; 2] = ["index.html", "index.htm"];

/// Responder que sirve archivos de `root`
#[derive(Debug, Clone)]
pub struct StaticFileResponder {
    /// Raíz canónica (absoluta, sin symlinks)
    root: PathBuf,
}

impl StaticFileResponder {
    /// Crea el responder; falla si `root` no existe o no es un directorio
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        if !root.is_dir() {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    /// Directorio raíz que se está sirviendo
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Traduce el path del request a un path relativo seguro.
    ///
    /// Retorna `None` si contiene `..`, un prefijo o un componente raíz.
    fn map_path(url_path: &str) -> Option<PathBuf> {
        let mut relative = PathBuf::new();
        for component in Path::new(url_path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(relative)
    }

    fn serve(&self, request: &Request) -> Response {
        let relative = match Self::map_path(request.path()) {
            Some(relative) => relative,
            None => {
                return Response::error(StatusCode::Forbidden, "Path escapes the served directory")
            }
        };

        let canonical = match self.root.join(&relative).canonicalize() {
            Ok(path) => path,
            Err(err) => return Self::io_error_response(&err, request.path()),
        };

        // Un symlink puede apuntar fuera de la raíz
        if !canonical.starts_with(&self.root) {
            return Response::error(StatusCode::Forbidden, "Path escapes the served directory");
        }

        if canonical.is_dir() {
            if !request.raw_path().ends_with('/') {
                return Response::redirect(&format!("{}/", request.raw_path()));
            }

            for index in INDEX_FILES {
                let candidate = canonical.join(index);
                if candidate.is_file() {
                    return Self::serve_file(&candidate);
                }
            }

            return Self::serve_listing(&canonical, request.path());
        }

        Self::serve_file(&canonical)
    }

    fn serve_file(path: &Path) -> Response {
        match fs::read(path) {
            Ok(bytes) => Response::new(StatusCode::Ok)
                .with_header("Content-Type", mime::content_type(path))
                .with_body_bytes(bytes),
            Err(err) => Self::io_error_response(&err, &path.display().to_string()),
        }
    }

    fn serve_listing(dir: &Path, url_path: &str) -> Response {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => return Self::io_error_response(&err, url_path),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.path().is_dir() {
                    name.push('/');
                }
                name
            })
            .collect();
        names.sort();

        let title = format!("Directory listing for {}", escape_html(url_path));
        let mut body = format!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
             <body>\n<h1>{title}</h1>\n<hr>\n<ul>\n"
        );
        for name in &names {
            let href = match name.strip_suffix('/') {
                Some(dir_name) => format!("{}/", urlencoding::encode(dir_name)),
                None => urlencoding::encode(name).into_owned(),
            };
            body.push_str(&format!(
                "<li><a href=\"{}\">{}</a></li>\n",
                href,
                escape_html(name)
            ));
        }
        body.push_str("</ul>\n<hr>\n</body></html>\n");

        Response::new(StatusCode::Ok)
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_body(&body)
    }

    fn io_error_response(err: &io::Error, what: &str) -> Response {
        match err.kind() {
            ErrorKind::NotFound => {
                Response::error(StatusCode::NotFound, &format!("Not found: {what}"))
            }
            ErrorKind::PermissionDenied => {
                Response::error(StatusCode::Forbidden, &format!("Permission denied: {what}"))
            }
            _ => Response::error(
                StatusCode::InternalServerError,
                &format!("Failed to read {what}: {err}"),
            ),
        }
    }
}

impl Responder for StaticFileResponder {
    fn respond(&self, request: &Request) -> Response {
        let mut response = self.serve(request);
        if request.method() == Method::HEAD {
            response = response.without_body();
        }
        add_common_headers(&mut response);
        response
    }
}

/// Lista los archivos `*.html` / `*.htm` de `dir` (sin recursión), ordenados
pub fn list_html_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| {
            let lower = name.to_ascii_lowercase();
            lower.ends_with(".html") || lower.ends_with(".htm")
        })
        .collect();
    files.sort();
    files
}
