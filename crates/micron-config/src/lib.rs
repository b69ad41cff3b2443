//! # Micron Config
//!
//! Process-level settings for Micron services.
//!
//! Per-method options live in [`micron_core::config`]; this crate loads
//! everything around them: the debug flag, the global method options,
//! logging and the HTTP host adapter.
//!
//! ## Example settings file
//!
//! ```toml
//! debug = false
//!
//! [options]
//! csrf = true
//! normalize = true
//!
//! [logging]
//! level = "info"
//! json_format = true
//!
//! [server]
//! http_addr = "0.0.0.0:8080"
//! session_cookie = "micron_session"
//! ```
//!
//! ## Loading
//!
//! ```
//! use micron_config::ConfigLoader;
//!
//! let settings = ConfigLoader::new()
//!     .with_string(r#"{"debug": true}"#, "json")
//!     .unwrap()
//!     .load()
//!     .unwrap();
//! assert!(settings.debug);
//! ```

#![doc(html_root_url = "https://docs.rs/micron-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod loader;
mod settings;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{MicronSettings, ServerSettings, DEFAULT_HTTP_ADDR, DEFAULT_SESSION_COOKIE};
