//! HTTP response record.

use std::collections::HashMap;
use std::time::SystemTime;

use http::StatusCode;
use httpdate::{fmt_http_date, parse_http_date};

/// An HTTP response under construction.
///
/// Defaults to `HTTP/1.1 200 OK` with no headers and an empty body. The
/// `Content-Length` header always matches the body length: it is restamped
/// whenever the body is assigned or appended to.
#[derive(Debug, Clone)]
pub struct Response {
    version: String,
    status_code: u16,
    status_reason: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            version: "HTTP/1.1".to_string(),
            status_code: 200,
            status_reason: "OK".to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Protocol version; always `HTTP/1.1`.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn set_status_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self
    }

    pub fn status_reason(&self) -> &str {
        &self.status_reason
    }

    pub fn set_status_reason(&mut self, reason: impl Into<String>) -> &mut Self {
        self.status_reason = reason.into();
        self
    }

    /// Sets the status code and its canonical reason phrase in one go.
    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status_code = status.as_u16();
        self.status_reason = status.canonical_reason().unwrap_or("Unknown").to_string();
        self
    }

    /// Value of the header `key`, if present.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn set_content_type(&mut self, value: impl Into<String>) -> &mut Self {
        self.set_header("Content-Type", value)
    }

    /// The `Date` header decoded from IMF-fixdate, if present and well-formed.
    pub fn date(&self) -> Option<SystemTime> {
        parse_http_date(self.header("Date")?).ok()
    }

    /// Stamps the `Date` header in IMF-fixdate, e.g.
    /// `Sun, 06 Nov 1994 08:49:37 GMT`.
    pub fn set_date(&mut self, date: SystemTime) -> &mut Self {
        self.set_header("Date", fmt_http_date(date))
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Replaces the body and restamps `Content-Length`.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) -> &mut Self {
        self.body = body.into();
        let length = self.body.len().to_string();
        self.set_header("Content-Length", length)
    }

    /// Appends to the body and restamps `Content-Length`.
    pub fn append_body(&mut self, chunk: impl AsRef<[u8]>) -> &mut Self {
        self.body.extend_from_slice(chunk.as_ref());
        let length = self.body.len().to_string();
        self.set_header("Content-Length", length)
    }
}
