//! HTTP/1.1 response builder.
//!
//! Handlers build a [`Response`] fluently; middleware may then read and rewrite
//! its body in place before it is serialized with [`Response::into_bytes`].

use bytes::{BufMut, BytesMut};

use super::{Headers, StatusCode};

/// Content type assumed for bodies that do not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// An HTTP/1.1 response.
///
/// # Examples
///
/// ```
/// use rendercache::http::{Response, StatusCode};
///
/// let mut response = Response::new(StatusCode::Ok).body("<p>draft</p>");
/// response.set_body("<p>final</p>");
/// response.add_header("X-Cache", "MISS");
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Type: text/html; charset=utf-8\r\n"));
/// assert!(text.ends_with("\r\n\r\n<p>final</p>"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place, for middleware decorating a downstream response.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets the response body from a string.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Sets the response body from raw bytes.
    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw body bytes.
    pub fn body_raw(&self) -> &[u8] {
        &self.body
    }

    /// Returns the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`std::str::Utf8Error`] when the body holds
    /// non-UTF-8 bytes (e.g. an image served through the same pipeline).
    pub fn body_text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    /// Replaces the body in-place.
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into().into_bytes();
    }

    /// Serializes the response using HTTP/1.1 wire format.
    ///
    /// Adds `Content-Type` ([`DEFAULT_CONTENT_TYPE`]) when the body is non-empty
    /// and none was set, then `Connection` and `Content-Length`.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        if content_length > 0 && !self.headers.contains("content-type") {
            self.headers.insert("Content-Type", DEFAULT_CONTENT_TYPE);
        }
        self.headers.set(
            "Connection",
            if self.keep_alive { "keep-alive" } else { "close" },
        );

        let mut buf = BytesMut::with_capacity(128 + self.headers.len() * 64 + content_length);
        buf.put(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());
        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }
        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n\r\n").as_bytes());
        buf.put(self.body.as_slice());

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn html_is_the_default_content_type() {
        let s = to_string(Response::new(StatusCode::Ok).body("<p>Hello</p>").into_bytes());
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(s.contains("Content-Length: 12\r\n"));
        assert!(s.ends_with("\r\n\r\n<p>Hello</p>"));
    }

    #[test]
    fn declared_content_type_is_kept() {
        let r = Response::new(StatusCode::Ok)
            .header("Content-Type", "application/json")
            .body("{}");
        let s = to_string(r.into_bytes());
        assert!(s.contains("Content-Type: application/json\r\n"));
        assert!(!s.contains("text/html"));
    }

    #[test]
    fn no_body_no_content_type() {
        let s = to_string(Response::new(StatusCode::NoContent).into_bytes());
        assert!(!s.contains("Content-Type"));
        assert!(s.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn connection_close() {
        let s = to_string(Response::new(StatusCode::Ok).keep_alive(false).into_bytes());
        assert!(s.contains("Connection: close\r\n"));
        assert!(!s.contains("keep-alive"));
    }

    #[test]
    fn set_body_rewrites_in_place() {
        let mut r = Response::new(StatusCode::Ok).body("<p>draft</p>");
        assert_eq!(r.body_text().unwrap(), "<p>draft</p>");
        r.set_body("<p>final!</p>");
        assert_eq!(r.body_text().unwrap(), "<p>final!</p>");
        assert!(to_string(r.into_bytes()).contains("Content-Length: 13\r\n"));
    }

    #[test]
    fn binary_body_is_not_text() {
        let r = Response::new(StatusCode::Ok).body_bytes(vec![0xff, 0xfe, 0x00]);
        assert!(r.body_text().is_err());
        assert_eq!(r.body_raw(), &[0xff, 0xfe, 0x00]);
    }
}
