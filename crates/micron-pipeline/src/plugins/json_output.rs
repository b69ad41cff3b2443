//! JSON output plugin.
//!
//! Serializes the output value into a pretty-printed JSON response. The
//! status is `200 OK` on success and `500 Internal Server Error` once an
//! error was recorded; clients tell failures apart by the `code` and
//! `caused_by` fields of the body, never by the status.

use crate::context::PluginContext;
use crate::hook::{Hook, HookSet};
use crate::plugin::Plugin;
use http::StatusCode;
use micron_core::{MicronResult, Response, ResponseExt};

/// The JSON output plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOutputPlugin;

impl JsonOutputPlugin {
    /// Creates the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for JsonOutputPlugin {
    fn name(&self) -> &'static str {
        "json_output"
    }

    fn hooks(&self) -> HookSet {
        HookSet::EMPTY.with(Hook::CreateResponse)
    }

    fn create_response(&self, ctx: &PluginContext) -> MicronResult<Response> {
        let status = if ctx.has_error() {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        };
        Response::json(status, ctx.output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{header, Method};
    use micron_core::{Config, Function, MicronError, MicronRequest, JSON_CONTENT_TYPE};
    use serde_json::json;

    fn context() -> PluginContext {
        PluginContext::new(
            Function::nullary("f", || Ok(())),
            Config::new(),
            MicronRequest::new(Method::POST, "/f"),
        )
    }

    #[test]
    fn test_success_response() {
        let mut ctx = context();
        ctx.set_output(json!({"greeting": "Hello, World!"}));

        let response = JsonOutputPlugin.create_response(&ctx).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], JSON_CONTENT_TYPE);
        assert_eq!(
            std::str::from_utf8(response.body()).unwrap(),
            "{\n  \"greeting\": \"Hello, World!\"\n}"
        );
    }

    #[test]
    fn test_error_response() {
        let mut ctx = context();
        let error = MicronError::access_denied();
        ctx.set_output(error.to_payload(false).to_value());
        ctx.set_error(error);

        let response = JsonOutputPlugin.create_response(&ctx).unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.json_value().unwrap()["code"], "AccessDenied");
    }
}
