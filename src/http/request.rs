//! # Parsing de Requests HTTP/1.0
//! src/http/request.rs
//!
//! Parser mínimo para lo que necesita un servidor de archivos estáticos:
//! request line, headers y path decodificado. No se lee body.
//!
//! ```text
//! GET /docs/index.html?v=2 HTTP/1.1\r\n
//! Host: localhost:8000\r\n
//! \r\n
//! ```

use std::collections::HashMap;

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Obtener un archivo
    GET,

    /// HEAD - Como GET pero sin body
    HEAD,
}

impl Method {
    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            _ => Err(ParseError::UnsupportedMethod(s.to_string())),
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
        }
    }
}

/// Request HTTP parseado
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,

    /// Path ya decodificado (ej: "/mi archivo.html")
    path: String,

    /// Path tal como llegó en la request line, sin query (ej: "/mi%20archivo.html")
    raw_path: String,

    headers: HashMap<String, String>,

    version: String,
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Request vacío
    EmptyRequest,

    /// Formato inválido de la request line
    InvalidRequestLine,

    /// Método HTTP no soportado (se responde 405)
    UnsupportedMethod(String),

    /// Versión HTTP distinta de 1.0 / 1.1
    InvalidHttpVersion(String),

    /// Header malformado
    InvalidHeader(String),

    /// Path con percent-encoding inválido o sin `/` inicial
    InvalidPath(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::EmptyRequest => write!(f, "Empty request"),
            ParseError::InvalidRequestLine => write!(f, "Invalid request line format"),
            ParseError::UnsupportedMethod(m) => write!(f, "Unsupported HTTP method: {}", m),
            ParseError::InvalidHttpVersion(v) => write!(f, "Invalid HTTP version: {}", v),
            ParseError::InvalidHeader(h) => write!(f, "Invalid header: {}", h),
            ParseError::InvalidPath(p) => write!(f, "Invalid request path: {}", p),
        }
    }
}

impl std::error::Error for ParseError {}

impl Request {
    /// Parsea un request desde bytes
    ///
    /// Solo se consideran las líneas hasta la primera línea vacía; lo que
    /// venga después (body) se ignora.
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use html_launcher::http::Request;
    ///
    /// let raw = b"GET /mi%20pagina.html?v=1 HTTP/1.0\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.path(), "/mi pagina.html");
    /// assert_eq!(request.raw_path(), "/mi%20pagina.html");
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        let request_str =
            std::str::from_utf8(buffer).map_err(|_| ParseError::InvalidRequestLine)?;

        if request_str.trim().is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        let head = match request_str.find("\r\n\r\n") {
            Some(end) => &request_str[..end],
            None => request_str,
        };
        let mut lines = head.split("\r\n");

        let request_line = lines.next().ok_or(ParseError::EmptyRequest)?;
        let (method, raw_path, version) = Self::parse_request_line(request_line)?;
        let raw_path = raw_path.split('?').next().unwrap_or_default().to_string();
        let path = Self::decode_path(&raw_path)?;
        let headers = Self::parse_headers(lines)?;

        Ok(Request {
            method,
            path,
            raw_path,
            headers,
            version,
        })
    }

    /// Formato: `GET /path?query HTTP/1.0`
    fn parse_request_line(line: &str) -> Result<(Method, String, String), ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        if parts.len() != 3 {
            return Err(ParseError::InvalidRequestLine);
        }

        let method = Method::from_str(parts[0])?;

        let version = parts[2].to_string();
        if version != "HTTP/1.0" && version != "HTTP/1.1" {
            return Err(ParseError::InvalidHttpVersion(version));
        }

        Ok((method, parts[1].to_string(), version))
    }

    /// Decodifica el path (ya sin query). La query no se interpreta.
    fn decode_path(raw_path: &str) -> Result<String, ParseError> {
        if !raw_path.starts_with('/') {
            return Err(ParseError::InvalidPath(raw_path.to_string()));
        }

        let path = urlencoding::decode(raw_path)
            .map_err(|_| ParseError::InvalidPath(raw_path.to_string()))?
            .into_owned();

        // Un NUL en el path nunca corresponde a un archivo real
        if path.contains('\0') {
            return Err(ParseError::InvalidPath(raw_path.to_string()));
        }

        Ok(path)
    }

    fn parse_headers<'a>(
        lines: impl Iterator<Item = &'a str>,
    ) -> Result<HashMap<String, String>, ParseError> {
        let mut headers = HashMap::new();

        for line in lines {
            if line.trim().is_empty() {
                break;
            }

            match line.split_once(':') {
                Some((name, value)) => {
                    headers.insert(name.trim().to_string(), value.trim().to_string());
                }
                None => return Err(ParseError::InvalidHeader(line.to_string())),
            }
        }

        Ok(headers)
    }

    /// Obtiene el método HTTP
    pub fn method(&self) -> Method {
        self.method
    }

    /// Path decodificado, sin query string
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path sin decodificar, tal como lo envió el cliente
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    /// Obtiene un header (sin distinguir mayúsculas)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Obtiene la versión HTTP
    pub fn version(&self) -> &str {
        &self.version
    }
}
