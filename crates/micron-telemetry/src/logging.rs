//! Structured logging for Micron services.
//!
//! Micron itself only emits `tracing` events: one `debug!` per hook
//! invocation, one `info!` per completed request, `warn!` for classified
//! errors and `error!` for fatal pipeline failures. This module installs
//! the subscriber that turns them into output.
//!
//! # Example
//!
//! ```rust,ignore
//! use micron_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(endpoint = "/hello", "Service ready");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use serde::Deserialize;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration.
///
/// Deserializable so it can sit in the `[logging]` section of the
/// settings file; missing keys take their [`Default`] values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,

    /// Filter directive (e.g. `"info"`, `"micron_pipeline=debug,info"`).
    pub level: String,

    /// JSON lines when true, human-readable output otherwise.
    pub json_format: bool,

    /// Whether to log span creation and close events.
    pub span_events: bool,

    /// Whether to include source file and line.
    pub file_line_info: bool,

    /// Whether to include thread IDs.
    pub thread_ids: bool,

    /// Whether to include the event target (module path).
    pub include_target: bool,

    /// Service name attached to the root span.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Human-readable output at `debug` level, with per-hook events.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "debug".to_string(),
            json_format: false,
            span_events: true,
            file_line_info: true,
            thread_ids: false,
            include_target: true,
            service_name: "micron".to_string(),
        }
    }

    /// JSON output at `info` level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json_format: true,
            span_events: false,
            file_line_info: false,
            thread_ids: false,
            include_target: true,
            service_name: "micron".to_string(),
        }
    }

    /// Picks the preset matching the service's debug flag.
    #[must_use]
    pub fn for_debug(debug: bool) -> Self {
        if debug {
            Self::development()
        } else {
            Self::production()
        }
    }

    /// Sets the filter directive.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Sets the service name.
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }
}

/// Installs the global `tracing` subscriber described by `config`.
///
/// Does nothing when `config.enabled` is false.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] for a bad `level`, and
/// [`TelemetryError::LoggingInit`] when a global subscriber is already
/// installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let result = if config.json_format {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_thread_ids(config.thread_ids)
            .with_target(config.include_target)
            .with_filter(filter);
        tracing_subscriber::registry().with(layer).try_init()
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_file(config.file_line_info)
            .with_line_number(config.file_line_info)
            .with_thread_ids(config.thread_ids)
            .with_target(config.include_target)
            .with_filter(filter);
        tracing_subscriber::registry().with(layer).try_init()
    };
    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::debug!(service = %config.service_name, level = %config.level, "Logging initialized");
    Ok(())
}

/// Parses a filter directive string.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] if the directive is invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::InvalidFilter {
        filter: filter.to_string(),
        reason: e.to_string(),
    })
}

/// Field names used in Micron's log events.
pub mod fields {
    /// Endpoint route rule.
    pub const ENDPOINT: &str = "endpoint";

    /// Business function name.
    pub const FUNCTION: &str = "function";

    /// Hook name.
    pub const HOOK: &str = "hook";

    /// Plugin name.
    pub const PLUGIN: &str = "plugin";

    /// HTTP method.
    pub const HTTP_METHOD: &str = "method";

    /// HTTP status code.
    pub const HTTP_STATUS: &str = "status";

    /// Request duration in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";

    /// Error code.
    pub const ERROR_CODE: &str = "code";

    /// Error origin (`client` or `server`).
    pub const CAUSED_BY: &str = "caused_by";

    /// Error display text.
    pub const ERROR: &str = "error";
}
