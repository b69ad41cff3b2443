//! Error types for Micron.
//!
//! This module provides [`MicronError`], the single error type that flows
//! through the request pipeline, and [`ErrorPayload`], the client-safe
//! representation it is classified into before being sent to a caller.
//!
//! # Classification
//!
//! Every error carries a [`CausedBy`] tag:
//!
//! | Origin | `caused_by` | Typical codes |
//! |---|---|---|
//! | The request was invalid, unauthorized or malformed | `client` | `AccessDenied`, `MissingInput`, `CsrfTokenRequired` |
//! | Something went wrong inside the service | `server` | `ImplementationError`, custom business errors |
//! | Anything not explicitly classified | `server` | `UnhandledException` |
//!
//! Errors that are not explicitly tagged default to `server`. Any type
//! implementing [`std::error::Error`] converts into a `MicronError` through
//! the `?` operator and becomes an `UnhandledException`, with the original
//! type name and message kept in the details.
//!
//! # Example
//!
//! ```
//! use micron_core::{CausedBy, MicronError};
//!
//! let error = MicronError::client("OutOfStock", "The requested item is not in stock.")
//!     .with_details(serde_json::json!({"item": "widget"}));
//!
//! assert_eq!(error.caused_by(), CausedBy::Client);
//! assert_eq!(error.code(), "OutOfStock");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Result type alias using [`MicronError`].
pub type MicronResult<T> = Result<T, MicronError>;

/// Well-known error codes.
pub mod codes {
    /// Access-control rejection.
    pub const ACCESS_DENIED: &str = "AccessDenied";
    /// No active auth session while one is required.
    pub const AUTHENTICATION_REQUIRED: &str = "AuthenticationRequired";
    /// Bad credentials during authentication.
    pub const AUTHENTICATION_FAILED: &str = "AuthenticationFailed";
    /// Active auth session lacks the required role.
    pub const AUTHORIZATION_FAILED: &str = "AuthorizationFailed";
    /// Code that does not follow the framework requirements.
    pub const IMPLEMENTATION_ERROR: &str = "ImplementationError";
    /// Any error that was not explicitly classified.
    pub const UNHANDLED_EXCEPTION: &str = "UnhandledException";
    /// Input could not be converted into the argument type of the function.
    pub const INVALID_INPUT: &str = "InvalidInput";
}

/// Who is to blame for an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CausedBy {
    /// The request itself was invalid, unauthorized or malformed.
    Client,
    /// An unexpected condition inside the service.
    Server,
}

impl CausedBy {
    /// Returns the wire name (`"client"` or `"server"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for CausedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CausedBy {
    type Err = MicronError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "client" => Ok(Self::Client),
            "server" => Ok(Self::Server),
            other => Err(MicronError::implementation(format!(
                "The 'caused_by' value can only be 'client' or 'server', not '{other}'"
            ))),
        }
    }
}

/// The error type raised by plugins, business functions and the pipeline.
///
/// `MicronError` deliberately does not implement [`std::error::Error`]:
/// that keeps the blanket `From<E: Error>` conversion coherent, so that
/// `?` on any foreign error produces an `UnhandledException`.
#[derive(Debug)]
pub struct MicronError {
    caused_by: CausedBy,
    code: Cow<'static, str>,
    description: String,
    details: Option<Value>,
    source: Option<anyhow::Error>,
    backtrace: Backtrace,
}

impl MicronError {
    /// Creates an error that does not declare who caused it.
    ///
    /// Such errors are treated as server-caused.
    #[must_use]
    pub fn new(code: impl Into<Cow<'static, str>>, description: impl AsRef<str>) -> Self {
        Self::tagged(CausedBy::Server, code.into(), description.as_ref())
    }

    /// Creates a client-caused error.
    #[must_use]
    pub fn client(code: impl Into<Cow<'static, str>>, description: impl AsRef<str>) -> Self {
        Self::tagged(CausedBy::Client, code.into(), description.as_ref())
    }

    /// Creates a server-caused error.
    #[must_use]
    pub fn server(code: impl Into<Cow<'static, str>>, description: impl AsRef<str>) -> Self {
        Self::tagged(CausedBy::Server, code.into(), description.as_ref())
    }

    fn tagged(caused_by: CausedBy, code: Cow<'static, str>, description: &str) -> Self {
        let description = collapse_whitespace(description);
        let description = if description.is_empty() {
            format!("Missing description for error type '{code}'")
        } else {
            description
        };
        Self {
            caused_by,
            code,
            description,
            details: None,
            source: None,
            backtrace: Backtrace::capture(),
        }
    }

    /// A method was called for which the client does not have sufficient
    /// access rights.
    #[must_use]
    pub fn access_denied() -> Self {
        Self::client(
            codes::ACCESS_DENIED,
            "A method was called for which the client does not have sufficient access rights.",
        )
    }

    /// A method requiring authentication was called without an active
    /// auth session.
    #[must_use]
    pub fn authentication_required() -> Self {
        Self::client(
            codes::AUTHENTICATION_REQUIRED,
            "A method was called for which authentication is required, \
             but no active auth session exists for the client.",
        )
    }

    /// Username or password incorrect during authentication.
    #[must_use]
    pub fn authentication_failed() -> Self {
        Self::client(
            codes::AUTHENTICATION_FAILED,
            "Username or password incorrect during authentication.",
        )
    }

    /// The client does not meet the authorization criteria of a method.
    #[must_use]
    pub fn authorization_failed() -> Self {
        Self::client(
            codes::AUTHORIZATION_FAILED,
            "A method was called for which authorization is required, \
             but the client does not meet the authorization criteria.",
        )
    }

    /// Code was found that is not written in accordance with the framework
    /// requirements. The message is carried in the details.
    #[must_use]
    pub fn implementation(message: impl Into<String>) -> Self {
        Self::server(
            codes::IMPLEMENTATION_ERROR,
            "Some code was found that is not written in accordance with \
             the Micron framework requirements.",
        )
        .with_details(Value::String(message.into()))
    }

    /// Wraps an error that was not classified by the service.
    #[must_use]
    pub fn unhandled(error: anyhow::Error) -> Self {
        Self::unhandled_as("Error", error)
    }

    /// Wraps the payload of a caught panic as an unhandled error with
    /// `error_type` `panic`.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic with a non-string payload".to_string());
        Self::unhandled_as("panic", anyhow::anyhow!(message))
    }

    fn unhandled_as(error_type: &str, error: anyhow::Error) -> Self {
        Self::server(
            codes::UNHANDLED_EXCEPTION,
            "During execution of a Micron method, an error was raised \
             that was not handled by the service.",
        )
        .with_details(json!({
            "error_type": error_type,
            "error_message": error.to_string(),
        }))
        .with_source(error)
    }

    /// Attaches a structured details payload. Details are communicated to
    /// the client, so they must not contain sensitive information.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attaches the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Reclassifies the error.
    #[must_use]
    pub fn with_caused_by(mut self, caused_by: CausedBy) -> Self {
        self.caused_by = caused_by;
        self
    }

    /// Returns who caused the error.
    #[must_use]
    pub const fn caused_by(&self) -> CausedBy {
        self.caused_by
    }

    /// Returns the machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the details payload, if any.
    #[must_use]
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Returns the underlying error, if any.
    #[must_use]
    pub fn source(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    /// Returns `true` for client-caused errors.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.caused_by == CausedBy::Client
    }

    /// Classifies this error into its client-facing payload.
    ///
    /// The trace is only filled when `debug` is set.
    #[must_use]
    pub fn to_payload(&self, debug: bool) -> ErrorPayload {
        ErrorPayload {
            caused_by: self.caused_by,
            code: self.code.to_string(),
            description: self.description.clone(),
            details: self.details.clone().unwrap_or_else(|| json!({})),
            trace: if debug { self.trace() } else { Vec::new() },
        }
    }

    fn trace(&self) -> Vec<String> {
        let mut lines = vec![format!("{}: {}", self.code, self.description)];
        if let Some(source) = &self.source {
            lines.extend(source.chain().map(|cause| format!("caused by: {cause}")));
        }
        if self.backtrace.status() == BacktraceStatus::Captured {
            lines.extend(
                self.backtrace
                    .to_string()
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(ToString::to_string),
            );
        }
        lines
    }
}

impl fmt::Display for MicronError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.description)
    }
}

impl<E> From<E> for MicronError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        let error_type = short_type_name(std::any::type_name::<E>());
        Self::unhandled_as(error_type, anyhow::Error::new(error))
    }
}

/// The client-facing representation of a classified error.
///
/// This is the JSON body of every failure response:
///
/// ```json
/// {
///   "caused_by": "client",
///   "code": "MissingInput",
///   "description": "The requested method requires input, ...",
///   "details": {},
///   "trace": []
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Who caused the error.
    pub caused_by: CausedBy,
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable description.
    pub description: String,
    /// Structured details, an empty object when none were supplied.
    pub details: Value,
    /// Stack trace lines, empty unless debug mode is enabled.
    pub trace: Vec<String>,
}

impl ErrorPayload {
    /// Converts the payload into a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "caused_by": self.caused_by,
            "code": self.code,
            "description": self.description,
            "details": self.details,
            "trace": self.trace,
        })
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
