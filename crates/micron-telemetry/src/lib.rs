//! # Micron Telemetry
//!
//! Logging setup for Micron services.
//!
//! The framework crates only emit [`tracing`] events and spans. Every
//! request runs inside a `micron_request` span carrying the endpoint,
//! function and HTTP method; the events inside it use the names in
//! [`fields`]:
//!
//! | Level | Event |
//! |-------|-------|
//! | `debug` | each hook invocation (`hook`, `plugin`) |
//! | `info` | request completed (`status`, `duration_ms`) |
//! | `warn` | error raised by a hook (`code`, `caused_by`) |
//! | `error` | fatal pipeline failure (`error`) |
//!
//! ## Example
//!
//! ```
//! use micron_telemetry::LogConfig;
//!
//! let config = LogConfig::for_debug(true);
//! assert!(!config.json_format);
//! assert_eq!(config.level, "debug");
//! ```

#![doc(html_root_url = "https://docs.rs/micron-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
