//! Process-level settings.

use micron_core::config::{validate_option_name, Config};
use micron_telemetry::{create_env_filter, LogConfig};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::ConfigError;

/// Default listen address of the HTTP host adapter.
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8080";

/// Default name of the session cookie.
pub const DEFAULT_SESSION_COOKIE: &str = "micron_session";

/// Settings of a Micron service.
///
/// ```
/// use micron_config::MicronSettings;
///
/// let settings = MicronSettings::default();
/// assert!(!settings.debug);
/// assert!(settings.options.is_empty());
/// assert_eq!(settings.server.session_cookie, "micron_session");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MicronSettings {
    /// Include stack traces in error responses.
    #[serde(default)]
    pub debug: bool,

    /// Options applied to every registered method.
    #[serde(default)]
    pub options: Config,

    /// Logging setup.
    #[serde(default)]
    pub logging: LogConfig,

    /// HTTP host adapter.
    #[serde(default)]
    pub server: ServerSettings,
}

/// Settings of the HTTP host adapter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// Listen address.
    pub http_addr: String,

    /// Name of the cookie carrying the session id.
    pub session_cookie: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
        }
    }
}

impl ServerSettings {
    /// Parses the listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.http_addr
            .parse()
            .map_err(|e| ConfigError::invalid_value("server.http_addr", format!("{e}")))
    }
}

impl MicronSettings {
    /// Debug mode with human-readable logs.
    #[must_use]
    pub fn development() -> Self {
        Self {
            debug: true,
            logging: LogConfig::development(),
            ..Self::default()
        }
    }

    /// JSON logs, no traces in error responses.
    #[must_use]
    pub fn production() -> Self {
        Self {
            debug: false,
            logging: LogConfig::production(),
            ..Self::default()
        }
    }

    /// Checks the values serde cannot check.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an option name that is not
    /// an identifier, an unparsable listen address, an empty or malformed
    /// cookie name, or an invalid log filter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in self.options.keys() {
            validate_option_name(name).map_err(|e| {
                ConfigError::invalid_value(format!("options.{name}"), e.description())
            })?;
        }

        self.server.socket_addr()?;

        let cookie = &self.server.session_cookie;
        if cookie.is_empty() || !cookie.bytes().all(is_cookie_name_byte) {
            return Err(ConfigError::invalid_value(
                "server.session_cookie",
                format!("'{cookie}' is not a valid cookie name"),
            ));
        }

        create_env_filter(&self.logging.level)
            .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;

        Ok(())
    }
}

// RFC 6265 token characters.
fn is_cookie_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte)
}
