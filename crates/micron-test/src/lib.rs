//! # Micron Test
//!
//! In-memory testing for Micron methods.
//!
//! [`TestClient`] calls methods straight through [`micron::Micron::dispatch`],
//! without a server or a port. It keeps one session per client and
//! replays the CSRF token from the previous response, so a test reads
//! like the calls a browser page would make:
//!
//! ```
//! use micron::{Function, Micron};
//! use micron_test::TestClient;
//! use serde_json::json;
//!
//! let mut micron = Micron::new();
//! micron
//!     .method(Function::unary("echo", |value: serde_json::Value| Ok(value)))
//!     .register()
//!     .unwrap();
//!
//! let client = TestClient::new(micron);
//! client.post("/echo").json(&json!([1])).send().assert_error("CsrfTokenRequired");
//!
//! client.bootstrap_csrf().unwrap();
//! client.post("/echo").json(&json!([1])).send().assert_json(&json!([1]));
//! client.post("/echo").send().assert_error("MissingInput");
//! ```

#![doc(html_root_url = "https://docs.rs/micron-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod response;

pub use client::{TestCall, TestClient};
pub use error::TestError;
pub use response::TestResponse;
