//! The inbound request as seen by the pipeline.

use crate::session::Session;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};

/// A request delivered by the host for one Micron method.
///
/// The host has already routed the request to a rule and collected the
/// body; plugins only see the method, headers, raw body and the client's
/// session.
#[derive(Debug, Clone)]
pub struct MicronRequest {
    method: Method,
    rule: String,
    headers: HeaderMap,
    body: Bytes,
    session: Session,
}

impl MicronRequest {
    /// Creates a request without headers, body or session data.
    #[must_use]
    pub fn new(method: Method, rule: impl Into<String>) -> Self {
        Self {
            method,
            rule: rule.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            session: Session::new(),
        }
    }

    /// Creates a request from an `http` request with a collected body.
    ///
    /// The URI path is used as the rule.
    #[must_use]
    pub fn from_http(request: http::Request<Bytes>, session: Session) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            rule: parts.uri.path().to_string(),
            headers: parts.headers,
            body,
            session,
        }
    }

    /// Sets the raw body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds a header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Replaces all headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Attaches the client's session.
    #[must_use]
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// The transport-level request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The rule the request was routed to.
    #[must_use]
    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// All request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns a header value as text, matching the name case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_value(name).and_then(|value| value.to_str().ok())
    }

    /// Returns a raw header value, which may not be valid text.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// The raw request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The client's session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let request = MicronRequest::new(Method::POST, "/hello")
            .with_body("\"Jacky\"")
            .with_header("X-Micron-CSRF-Token", "abc");

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.rule(), "/hello");
        assert_eq!(request.body().as_ref(), b"\"Jacky\"");
        assert_eq!(request.header("x-micron-csrf-token"), Some("abc"));
        assert_eq!(request.header("missing"), None);
    }

    #[test]
    fn test_non_text_header_value() {
        let mut headers = HeaderMap::new();
        headers.insert("x-token", HeaderValue::from_bytes(b"\xff").unwrap());
        let request = MicronRequest::new(Method::POST, "/x").with_headers(headers);

        assert_eq!(request.header("x-token"), None);
        assert_eq!(request.header_value("X-Token").unwrap().as_bytes(), b"\xff");
    }

    #[test]
    fn test_invalid_header_is_ignored() {
        let request = MicronRequest::new(Method::POST, "/x").with_header("bad header", "v");
        assert!(request.headers().is_empty());
    }

    #[test]
    fn test_from_http() {
        let session = Session::new();
        let http_request = http::Request::builder()
            .method(Method::GET)
            .uri("http://localhost/ping?x=1")
            .header("content-type", "application/json")
            .body(Bytes::from_static(b"null"))
            .unwrap();

        let request = MicronRequest::from_http(http_request, session.clone());
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.rule(), "/ping");
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.body().as_ref(), b"null");

        request.session().set("k", serde_json::json!(1));
        assert!(session.contains("k"));
    }
}
