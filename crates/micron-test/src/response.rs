//! Test response wrapper.

use crate::error::TestError;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use micron::pipeline::plugins::csrf::CSRF_TOKEN_HEADER;
use micron::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A method response with helpers for assertions.
///
/// Micron answers `200 OK` on success and `500` with an error body
/// otherwise; [`error_code`](Self::error_code) and
/// [`caused_by`](Self::caused_by) read that body.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl From<Response> for TestResponse {
    fn from(response: Response) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }
}

impl TestResponse {
    /// Creates a test response from raw parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns true for `200 OK`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value by name.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// The CSRF token issued with this response.
    #[must_use]
    pub fn csrf_token(&self) -> Option<&str> {
        self.header_str(CSRF_TOKEN_HEADER)
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("Invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Deserializes the body as a JSON value.
    pub fn json_value(&self) -> Result<Value, TestError> {
        self.json()
    }

    /// The `code` of an error response.
    #[must_use]
    pub fn error_code(&self) -> Option<String> {
        self.error_field("code")
    }

    /// The `caused_by` of an error response (`client` or `server`).
    #[must_use]
    pub fn caused_by(&self) -> Option<String> {
        self.error_field("caused_by")
    }

    fn error_field(&self, name: &str) -> Option<String> {
        if self.is_success() {
            return None;
        }
        self.json_value()
            .ok()?
            .get(name)?
            .as_str()
            .map(str::to_string)
    }

    // Assertion methods

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {}, got {}: {}",
            expected,
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts a successful call.
    ///
    /// # Panics
    ///
    /// Panics if the call failed; the message includes the error body.
    pub fn assert_success(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    /// Asserts that the call returned `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the call failed or returned another value.
    pub fn assert_json(&self, expected: &Value) -> &Self {
        self.assert_success();
        let actual = self.json_value().expect("Body should be valid JSON");
        assert_eq!(&actual, expected, "Result mismatch");
        self
    }

    /// Asserts that the call failed with error `code`.
    ///
    /// # Panics
    ///
    /// Panics if the call succeeded or failed with another code.
    pub fn assert_error(&self, code: &str) -> &Self {
        assert_eq!(
            self.error_code().as_deref(),
            Some(code),
            "Expected error {code}, got status {} with body: {}",
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts that a header exists with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let expected = expected.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("Header '{name}' not found"));
        assert_eq!(actual, expected, "Header '{name}' mismatch");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use micron::ResponseExt;
    use serde_json::json;

    #[test]
    fn test_success_response() {
        let response = TestResponse::from(Response::json(StatusCode::OK, &json!("pong")).unwrap());

        response.assert_success().assert_json(&json!("pong"));
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.error_code(), None);
        assert_eq!(response.text().unwrap(), "\"pong\"");
    }

    #[test]
    fn test_error_response() {
        let body = json!({
            "caused_by": "client",
            "code": "MissingInput",
            "description": "Missing input.",
            "details": {},
            "trace": [],
        });
        let response = TestResponse::from(
            Response::json(StatusCode::INTERNAL_SERVER_ERROR, &body).unwrap(),
        );

        response.assert_error("MissingInput");
        assert_eq!(response.caused_by().as_deref(), Some("client"));
    }

    #[test]
    fn test_csrf_token_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::HeaderName::from_bytes(CSRF_TOKEN_HEADER.as_bytes()).unwrap(),
            HeaderValue::from_static("token-1"),
        );
        let response = TestResponse::new(StatusCode::OK, headers, Bytes::from_static(b"null"));

        assert_eq!(response.csrf_token(), Some("token-1"));
        response.assert_header(CSRF_TOKEN_HEADER, "token-1");
    }

    #[test]
    #[should_panic(expected = "Expected error AccessDenied")]
    fn test_assert_error_on_success_panics() {
        TestResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(b"1"))
            .assert_error("AccessDenied");
    }

    #[test]
    fn test_invalid_utf8_body() {
        let response =
            TestResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(b"\xff"));
        assert!(matches!(response.text(), Err(TestError::BodyRead(_))));
        assert!(matches!(response.json_value(), Err(TestError::Json(_))));
    }
}
