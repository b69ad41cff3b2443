//! # Micron Server
//!
//! HTTP/1.1 host adapter for Micron, built on hyper and tokio.
//!
//! The server turns each HTTP request into a [`micron::MicronRequest`]
//! (the URI path is the rule), attaches the client's session and hands it
//! to [`micron::Micron::dispatch`]. Sessions live in memory and are found
//! through the session cookie (`micron_session` unless configured).
//!
//! | Situation | Status | Body `code` |
//! |-----------|--------|-------------|
//! | Method returned | `200` | none |
//! | Method or plugin raised | `500` | the error's code |
//! | No method for the path | `404` | `NotFound` |
//! | Pipeline failed fatally | `500` | `InternalServerError` |
//!
//! ## Example
//!
//! ```rust,no_run
//! use micron::{Function, Micron};
//! use micron_config::ConfigLoader;
//! use micron_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ConfigLoader::new()
//!         .with_optional_file("micron.toml")?
//!         .with_env_prefix("MICRON")
//!         .load()?;
//!
//!     let mut micron = Micron::from_settings(&settings).map_err(|e| e.to_string())?;
//!     micron
//!         .method(Function::nullary("now", || Ok("2024-01-01")))
//!         .register()
//!         .map_err(|e| e.to_string())?;
//!
//!     Server::new(micron, &settings.server).run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/micron-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod server;
pub mod sessions;
pub mod shutdown;

pub use error::ServerError;
pub use server::{HttpResponse, Server, DEFAULT_SHUTDOWN_TIMEOUT, INTERNAL_ERROR_CODE, NOT_FOUND_CODE};
pub use sessions::{ResolvedSession, SessionStore};
pub use shutdown::ShutdownSignal;
