//! JSON input plugin.
//!
//! Reads the input value from the request body. An absent body, or one
//! consisting only of whitespace, yields `null`; anything else must be
//! valid UTF-8 JSON.

use crate::context::PluginContext;
use crate::hook::{Hook, HookSet};
use crate::plugin::Plugin;
use micron_core::{MicronError, MicronResult};
use serde_json::Value;

/// Error code for a body that is not valid JSON.
pub const NON_JSON_INPUT: &str = "NonJsonInput";

/// The JSON input plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonInputPlugin;

impl JsonInputPlugin {
    /// Creates the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for JsonInputPlugin {
    fn name(&self) -> &'static str {
        "json_input"
    }

    fn hooks(&self) -> HookSet {
        HookSet::EMPTY.with(Hook::ReadInput)
    }

    fn read_input(&self, ctx: &PluginContext) -> MicronResult<Value> {
        let body = ctx.request().body();
        let text = std::str::from_utf8(body).map_err(|_| non_json_input())?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(text).map_err(|_| non_json_input())
    }
}

fn non_json_input() -> MicronError {
    MicronError::client(
        NON_JSON_INPUT,
        "The POST body for the request did not contain valid JSON data.",
    )
}
