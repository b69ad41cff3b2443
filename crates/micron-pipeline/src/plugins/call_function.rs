//! Business-function call plugin.
//!
//! Calls the endpoint's function with the input value, following a simple
//! convention based on its [`Signature`](micron_core::Signature):
//!
//! | Signature | `null` input | other input |
//! |---|---|---|
//! | no argument | `f()` | `UnexpectedInput` |
//! | one argument | `MissingInput` | `f(input)` |
//! | one argument with default | `f()` (default applies) | `f(input)` |

use crate::context::PluginContext;
use crate::hook::{Hook, HookSet};
use crate::plugin::Plugin;
use micron_core::{MicronError, MicronResult};
use serde_json::Value;

/// Error code for a call without input to a function that requires it.
pub const MISSING_INPUT: &str = "MissingInput";

/// Error code for a call with input to a function that takes none.
pub const UNEXPECTED_INPUT: &str = "UnexpectedInput";

/// The call-function plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallFunctionPlugin;

impl CallFunctionPlugin {
    /// Creates the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for CallFunctionPlugin {
    fn name(&self) -> &'static str {
        "call_function"
    }

    fn hooks(&self) -> HookSet {
        HookSet::EMPTY.with(Hook::CallFunction)
    }

    fn call_function(&self, ctx: &PluginContext) -> MicronResult<Value> {
        let function = ctx.function();
        let signature = function.signature();
        signature.validate(function.name())?;

        let input = match ctx.input() {
            Value::Null => None,
            input => Some(input.clone()),
        };
        match (signature.wants_input(), input) {
            (false, Some(_)) => Err(MicronError::client(
                UNEXPECTED_INPUT,
                "The requested method does not require any input, \
                 but input was provided by the client.",
            )),
            (true, None) if !signature.has_default() => Err(MicronError::client(
                MISSING_INPUT,
                "The requested method requires input, \
                 but no input was provided by the client.",
            )),
            (_, input) => function.call(input),
        }
    }
}
