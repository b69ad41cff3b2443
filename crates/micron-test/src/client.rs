//! Test client for in-memory method calls.

use crate::error::TestError;
use crate::response::TestResponse;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use micron::pipeline::plugins::csrf::CSRF_TOKEN_HEADER;
use micron::{Micron, MicronRequest, Session, PING_RULE};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// A client calling Micron methods without a server.
///
/// The client behaves like one browser tab: it keeps a single session for
/// its lifetime and remembers the last CSRF token it was issued, sending
/// it with every following call.
///
/// # Example
///
/// ```
/// use micron::{Function, Micron};
/// use micron_test::TestClient;
/// use serde_json::json;
///
/// let mut micron = Micron::new();
/// micron
///     .method(Function::unary("double", |n: i64| Ok(n * 2)))
///     .register()
///     .unwrap();
///
/// let client = TestClient::new(micron);
/// client.bootstrap_csrf().unwrap();
/// client.post("/double").json(&21).send().assert_json(&json!(42));
/// ```
#[must_use]
pub struct TestClient {
    micron: Arc<Micron>,
    session: Session,
    csrf_token: Mutex<Option<String>>,
    default_headers: HeaderMap,
}

impl TestClient {
    /// Creates a client with a fresh session.
    pub fn new(micron: Micron) -> Self {
        Self::shared(Arc::new(micron))
    }

    /// Creates a client for a registry shared with other clients.
    pub fn shared(micron: Arc<Micron>) -> Self {
        Self {
            micron,
            session: Session::new(),
            csrf_token: Mutex::new(None),
            default_headers: HeaderMap::new(),
        }
    }

    /// Adds a header sent with every call.
    pub fn with_default_header(mut self, name: &str, value: &str) -> Result<Self, TestError> {
        let (name, value) = parse_header(name, value)?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// The registry under test.
    #[must_use]
    pub fn micron(&self) -> &Micron {
        &self.micron
    }

    /// The client's session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The last CSRF token issued to this client.
    #[must_use]
    pub fn csrf_token(&self) -> Option<String> {
        self.csrf_token.lock().clone()
    }

    /// Calls `/ping` to obtain a first CSRF token.
    pub fn bootstrap_csrf(&self) -> Result<TestResponse, TestError> {
        let response = self.post(PING_RULE).try_send()?;
        if response.csrf_token().is_none() {
            return Err(TestError::MissingCsrfToken(PING_RULE.to_string()));
        }
        Ok(response)
    }

    /// Starts a `POST` call to `rule`.
    pub fn post(&self, rule: impl Into<String>) -> TestCall<'_> {
        self.call(Method::POST, rule)
    }

    /// Starts a call with another HTTP method.
    pub fn call(&self, method: Method, rule: impl Into<String>) -> TestCall<'_> {
        TestCall {
            client: self,
            method,
            rule: rule.into(),
            headers: self.default_headers.clone(),
            body: Bytes::new(),
            send_csrf_token: true,
        }
    }

    fn send_internal(&self, call: TestCall<'_>) -> Result<TestResponse, TestError> {
        let mut headers = call.headers;
        if call.send_csrf_token {
            if let Some(token) = self.csrf_token() {
                let (name, value) = parse_header(CSRF_TOKEN_HEADER, &token)?;
                headers.insert(name, value);
            }
        }

        let request = MicronRequest::new(call.method, call.rule.as_str())
            .with_headers(headers)
            .with_body(call.body)
            .with_session(self.session.clone());

        let response: TestResponse = self
            .micron
            .dispatch(request)
            .ok_or(TestError::UnknownRule(call.rule))??
            .into();

        if let Some(token) = response.csrf_token() {
            *self.csrf_token.lock() = Some(token.to_string());
        }
        Ok(response)
    }
}

/// A call being built by a [`TestClient`].
#[must_use = "a call does nothing until `send` is called"]
pub struct TestCall<'a> {
    client: &'a TestClient,
    method: Method,
    rule: String,
    headers: HeaderMap,
    body: Bytes,
    send_csrf_token: bool,
}

impl TestCall<'_> {
    /// Sets a header.
    ///
    /// # Panics
    ///
    /// Panics if the name or value is not a valid header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let (name, value) = parse_header(name, value).expect("valid header");
        self.headers.insert(name, value);
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the JSON-encoded argument of the call.
    ///
    /// # Panics
    ///
    /// Panics if the value cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.body = serde_json::to_vec(value).expect("serializable input").into();
        self
    }

    /// Does not send the stored CSRF token with this call.
    pub fn without_csrf_token(mut self) -> Self {
        self.send_csrf_token = false;
        self
    }

    /// Sends the call.
    ///
    /// # Panics
    ///
    /// Panics on an unknown rule or a fatal pipeline failure.
    pub fn send(self) -> TestResponse {
        self.try_send().expect("call should produce a response")
    }

    /// Sends the call and returns a `Result`.
    pub fn try_send(self) -> Result<TestResponse, TestError> {
        let client = self.client;
        client.send_internal(self)
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), TestError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| TestError::InvalidHeader(format!("{name}: {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| TestError::InvalidHeader(format!("{name}: {e}")))?;
    Ok((name, value))
}
