//! # Micron Pipeline
//!
//! The hook-based plugin pipeline of the Micron framework.
//!
//! Every request for a Micron method flows through a fixed sequence of
//! named hooks. Plugins implement any subset of them:
//!
//! ```text
//! request_methods → start_request → check_access → after_check_access
//!   → read_input → normalize_input → validate_input → call_function
//!   → process_output → create_response → process_response → end_request
//!                            ↑ on error: create_response → process_error ┘
//! ```
//!
//! | Kind | Hooks | Who runs |
//! |------|-------|----------|
//! | Exclusive | `request_methods`, `read_input`, `call_function`, `create_response` | the last registered implementor |
//! | Additive | all others | every implementor, in registration order |
//!
//! ## Example
//!
//! ```
//! use micron_pipeline::{Hook, Pipeline, REQUEST_SEQUENCE};
//!
//! assert_eq!(REQUEST_SEQUENCE[0], Hook::RequestMethods);
//! assert!(Hook::CallFunction.is_exclusive());
//! assert!(Hook::ProcessError.is_additive());
//! assert!(!Pipeline::new().debug());
//! ```

#![doc(html_root_url = "https://docs.rs/micron-pipeline/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod container;
pub mod context;
mod endpoint;
mod error;
pub mod hook;
pub mod pipeline;
pub mod plugin;
pub mod plugins;

pub use container::PluginContainer;
pub use context::PluginContext;
pub use endpoint::Endpoint;
pub use error::PipelineFailure;
pub use hook::{Hook, HookSet};
pub use pipeline::{Pipeline, REQUEST_METHOD_NOT_ALLOWED, REQUEST_SEQUENCE};
pub use plugin::{FnPlugin, Plugin};
