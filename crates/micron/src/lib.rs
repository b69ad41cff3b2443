//! # Micron
//!
//! **JSON methods over HTTP, processed by a hook-based plugin pipeline.**
//!
//! A Micron method is a plain business function taking at most one
//! argument. Micron reads the argument from a JSON request body and
//! turns the return value into a JSON response. Everything in between
//! (CSRF protection, authentication, input normalization, error
//! rendering) is done by plugins hooked into a fixed sequence of stages.
//!
//! ## Quick Start
//!
//! ```
//! use micron::prelude::*;
//! use http::Method;
//! use serde_json::json;
//!
//! let mut micron = Micron::new();
//! micron
//!     .method(Function::with_default("hello", "World".to_string(), |name: String| {
//!         Ok(format!("Hello, {name}!"))
//!     }))
//!     .option("csrf", false)
//!     .register()
//!     .unwrap();
//!
//! let request = MicronRequest::new(Method::POST, "/hello").with_body(r#""  Jacky ""#);
//! let response = micron.dispatch(request).unwrap().unwrap();
//! assert_eq!(response.json_value().unwrap(), json!("Hello, Jacky!"));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! request_methods → start_request → check_access → after_check_access
//!   → read_input → normalize_input → validate_input → call_function
//!   → process_output → create_response → process_response → end_request
//! ```
//!
//! A hook error renders the error as the response body and runs the
//! `process_error` hooks. The `end_request` hooks always run once.
//!
//! ## Crates
//!
//! | Crate | Re-exported as |
//! |-------|----------------|
//! | `micron-core` | [`core`] |
//! | `micron-pipeline` | [`pipeline`] |
//! | `micron-config` | [`config`] |

#![doc(html_root_url = "https://docs.rs/micron/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod registry;

pub use micron_config as config;
pub use micron_core as core;
pub use micron_pipeline as pipeline;

pub use micron_core::{
    CausedBy, Config, Function, MicronError, MicronRequest, MicronResult, Response, ResponseExt,
    Session,
};
pub use micron_pipeline::plugins::auth_session;
pub use micron_pipeline::{FnPlugin, Hook, Pipeline, PipelineFailure, Plugin, PluginContext};
pub use registry::{MethodBuilder, Micron, PING_RULE};

/// Prelude module for convenient imports.
///
/// ```
/// use micron::prelude::*;
/// ```
pub mod prelude {
    pub use crate::registry::{MethodBuilder, Micron};
    pub use micron_core::{
        Config, Function, MicronError, MicronRequest, MicronResult, ResponseExt, Session,
    };
    pub use micron_pipeline::{FnPlugin, Hook, HookSet, Plugin, PluginContext};
}
