//! HTTP response buffer and the sink it is written into.

use std::collections::HashMap;
use std::io;

/// Body of the default not-found response.
pub const NOT_FOUND_BODY: &str = "404 page not found\n";

/// The capabilities the dispatcher needs from an outgoing response.
///
/// The network layer implements this for its own transport.
pub trait ResponseSink {
    /// Sets the status code.
    fn set_status(&mut self, status: u16);

    /// Sets a header, replacing any earlier value.
    fn set_header(&mut self, name: &str, value: &str);

    /// Appends bytes to the body.
    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()>;
}

/// An HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Creates a new response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Creates a 200 OK response.
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Creates the standard 404 Not Found response.
    pub fn not_found() -> Self {
        Self::new(404)
            .header("Content-Type", "text/plain; charset=utf-8")
            .header("X-Content-Type-Options", "nosniff")
            .body(NOT_FOUND_BODY)
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Gets a header value, ignoring ASCII case.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the body as a string.
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }

    /// Clears status, headers and body in place.
    pub fn clear(&mut self) {
        self.status = 200;
        self.headers.clear();
        self.body.clear();
    }

    /// Writes status, headers and body into `sink`.
    pub fn write_to(&self, sink: &mut dyn ResponseSink) -> io::Result<()> {
        sink.set_status(self.status);
        for (name, value) in &self.headers {
            sink.set_header(name, value);
        }
        if self.body.is_empty() {
            return Ok(());
        }
        sink.write_body(&self.body)
    }

    /// Returns the status text for the current status code.
    pub fn status_text(&self) -> &'static str {
        match self.status {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            409 => "Conflict",
            422 => "Unprocessable Entity",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "Unknown",
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

/// A response buffer is itself a sink, which lets tests and in-process
/// callers collect what a transport would have received.
impl ResponseSink for Response {
    fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.body.extend_from_slice(chunk);
        Ok(())
    }
}
