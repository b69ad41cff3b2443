//! The per-request execution context.
//!
//! A [`PluginContext`] is created by the executor for every request and
//! passed to every hook call. It carries six fields, each with an access
//! discipline plugins are expected to honor:
//!
//! | Field | Written by | Access |
//! |---|---|---|
//! | `function` | executor | read-only |
//! | `config` | executor | replaceable in `start_request`, read-only elsewhere |
//! | `input` | `read_input` | replaceable in `normalize_input`, read-only after |
//! | `output` | `call_function` | replaceable in `process_output`, read-only after |
//! | `response` | `create_response` | replaceable in `process_error` / `process_response` |
//! | `error` | executor | read-only; plugins cannot write it |
//!
//! Only the `error` rule is enforced by the type system. The others are a
//! contract between plugins.
//!
//! Plugin instances are shared between concurrent requests. State that a
//! plugin needs to carry from one hook to the next belongs in the context
//! extensions, never in fields of the plugin itself.

use micron_core::{Config, Function, MicronError, MicronRequest, Response, Session};
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Context that flows through the hooks of one request.
///
/// # Example
///
/// ```
/// use micron_core::{Function, MicronRequest};
/// use micron_pipeline::PluginContext;
/// use serde_json::json;
///
/// let function = Function::nullary("ping", || Ok("pong"));
/// let request = MicronRequest::new(http::Method::POST, "/ping");
/// let mut ctx = PluginContext::new(function, Default::default(), request);
///
/// assert!(ctx.input().is_null());
/// ctx.set_input(json!("  Jacky "));
/// assert_eq!(ctx.input(), &json!("  Jacky "));
/// assert!(ctx.error().is_none());
/// ```
#[derive(Debug)]
pub struct PluginContext {
    function: Function,
    config: Config,
    request: MicronRequest,
    input: Value,
    output: Value,
    response: Option<Response>,
    error: Option<MicronError>,
    started_at: Instant,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PluginContext {
    /// Creates the context for one request.
    #[must_use]
    pub fn new(function: Function, config: Config, request: MicronRequest) -> Self {
        Self {
            function,
            config,
            request,
            input: Value::Null,
            output: Value::Null,
            response: None,
            error: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// The business function of the endpoint.
    #[must_use]
    pub fn function(&self) -> &Function {
        &self.function
    }

    /// The effective configuration of the endpoint.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable configuration. Only `start_request` implementations should
    /// use this, for example to fill in defaults.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// The inbound request.
    #[must_use]
    pub fn request(&self) -> &MicronRequest {
        &self.request
    }

    /// The client's session.
    #[must_use]
    pub fn session(&self) -> &Session {
        self.request.session()
    }

    /// The input value; `null` until `read_input` ran.
    #[must_use]
    pub fn input(&self) -> &Value {
        &self.input
    }

    /// Replaces the input value.
    pub fn set_input(&mut self, input: Value) {
        self.input = input;
    }

    /// Takes the input value, leaving `null` behind.
    pub fn take_input(&mut self) -> Value {
        self.input.take()
    }

    /// The output value; `null` until `call_function` ran, and the error
    /// payload once an error was recorded.
    #[must_use]
    pub fn output(&self) -> &Value {
        &self.output
    }

    /// Replaces the output value.
    pub fn set_output(&mut self, output: Value) {
        self.output = output;
    }

    /// Takes the output value, leaving `null` behind.
    pub fn take_output(&mut self) -> Value {
        self.output.take()
    }

    /// The response, once `create_response` ran.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Mutable access to the response, for header injection and the like.
    pub fn response_mut(&mut self) -> Option<&mut Response> {
        self.response.as_mut()
    }

    /// Replaces the response.
    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    /// Takes the response out of the context.
    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    /// The error recorded by the executor, if any.
    #[must_use]
    pub fn error(&self) -> Option<&MicronError> {
        self.error.as_ref()
    }

    /// Returns true once an error was recorded.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub(crate) fn set_error(&mut self, error: MicronError) {
        self.error = Some(error);
    }

    pub(crate) fn take_error(&mut self) -> Option<MicronError> {
        self.error.take()
    }

    /// Returns when the request started processing.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value for later hooks of the same request.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Mutable access to a typed extension value.
    pub fn get_extension_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Checks if an extension of the given type exists.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}
