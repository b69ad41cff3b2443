//! # Micron Core
//!
//! Core types shared by every Micron crate.
//!
//! - [`MicronError`] - The pipeline error type and its client-facing [`ErrorPayload`]
//! - [`config`] - Method configuration levels and the pure option merger
//! - [`Function`] - Type-erased business function with its declared [`Signature`]
//! - [`MicronRequest`] / [`Response`] - What the host hands in and gets back
//! - [`Session`] - Per-client session data supplied by the host

#![doc(html_root_url = "https://docs.rs/micron-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
mod function;
mod request;
mod response;
mod session;

pub use config::{Config, ConfigExt, MethodConfig};
pub use error::{codes, CausedBy, ErrorPayload, MicronError, MicronResult};
pub use function::{Function, Signature};
pub use request::MicronRequest;
pub use response::{Response, ResponseExt, JSON_CONTENT_TYPE};
pub use session::Session;
