//! Server errors.

use micron_config::ConfigError;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors that stop the server from serving.
///
/// Request-level failures never surface here; they are answered with a
/// JSON error body and logged.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The server settings are invalid.
    #[error("Invalid server settings: {0}")]
    Config(#[from] ConfigError),

    /// The listen address could not be bound.
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error on the listener.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:80".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        };
        assert_eq!(err.to_string(), "Failed to bind to 127.0.0.1:80: address in use");

        let err = ServerError::from(ConfigError::invalid_value("server.http_addr", "bad"));
        assert!(err.to_string().starts_with("Invalid server settings"));
    }
}
