//! HTTP request record.

use std::collections::HashMap;

/// A parsed HTTP/1.1 request.
///
/// Fields are filled in incrementally by the request decoder; an empty
/// method, path or version means "not yet parsed". Header keys are stored
/// case-sensitively, exactly as received on the wire.
#[derive(Debug, Default, Clone)]
pub struct Request {
    method: String,
    path: String,
    version: String,
    headers: HashMap<String, String>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request method, e.g. `GET`.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn set_method(&mut self, method: impl Into<String>) -> &mut Self {
        self.method = method.into();
        self
    }

    /// Request path, e.g. `/api/some`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.path = path.into();
        self
    }

    /// Protocol version, e.g. `HTTP/1.1`.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn set_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.version = version.into();
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

    /// Declared body size, if a well-formed `Content-Length` is present.
    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length")?.trim().parse().ok()
    }

    /// Whether the connection should be kept open after the response.
    ///
    /// Only an explicit `Connection: close` opts out.
    pub fn keep_alive(&self) -> bool {
        self.header("Connection") != Some("close")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unparsed() {
        let request = Request::new();
        assert!(request.method().is_empty());
        assert!(request.path().is_empty());
        assert!(request.version().is_empty());
        assert!(request.headers().is_empty());
    }

    #[test]
    fn content_length_requires_a_number() {
        let mut request = Request::new();
        assert_eq!(request.content_length(), None);

        request.set_header("Content-Length", "42");
        assert_eq!(request.content_length(), Some(42));

        request.set_header("Content-Length", "many");
        assert_eq!(request.content_length(), None);
    }

    #[test]
    fn keep_alive_unless_asked_to_close() {
        let mut request = Request::new();
        assert!(request.keep_alive());

        request.set_header("Connection", "keep-alive");
        assert!(request.keep_alive());

        request.set_header("Connection", "close");
        assert!(!request.keep_alive());
    }

    #[test]
    fn header_keys_are_case_sensitive() {
        let mut request = Request::new();
        request.set_header("Host", "example.org");
        assert_eq!(request.header("Host"), Some("example.org"));
        assert_eq!(request.header("host"), None);
    }
}
