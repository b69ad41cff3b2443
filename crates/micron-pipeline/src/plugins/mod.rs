//! Bundled plugins.
//!
//! [`defaults`] registers them in this order:
//!
//! 1. [`csrf`] - CSRF token check and issue
//! 2. [`auth`] - auth session and role checks
//! 3. [`json_input`] - read the input from a JSON body
//! 4. [`normalize_input`] - strip strings, empty strings to `null`
//! 5. [`call_function`] - call the business function
//! 6. [`json_output`] - JSON response, status 200 or 500
//! 7. [`request_methods`] - accept `POST`

pub mod auth;
pub mod auth_session;
pub mod call_function;
pub mod csrf;
pub mod json_input;
pub mod json_output;
pub mod normalize_input;
pub mod request_methods;

pub use auth::AuthPlugin;
pub use call_function::CallFunctionPlugin;
pub use csrf::CsrfPlugin;
pub use json_input::JsonInputPlugin;
pub use json_output::JsonOutputPlugin;
pub use normalize_input::NormalizeInputPlugin;
pub use request_methods::RequestMethodsPlugin;

use crate::container::PluginContainer;

/// Returns a container holding the bundled plugins in their standard order.
#[must_use]
pub fn defaults() -> PluginContainer {
    let mut plugins = PluginContainer::new();
    plugins
        .add(CsrfPlugin)
        .add(AuthPlugin)
        .add(JsonInputPlugin)
        .add(NormalizeInputPlugin)
        .add(CallFunctionPlugin)
        .add(JsonOutputPlugin)
        .add(RequestMethodsPlugin);
    plugins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::Hook;

    #[test]
    fn test_default_order() {
        assert_eq!(
            defaults().names(),
            vec![
                "csrf",
                "auth",
                "json_input",
                "normalize_input",
                "call_function",
                "json_output",
                "request_methods"
            ]
        );
    }

    #[test]
    fn test_every_exclusive_hook_is_covered() {
        let plugins = defaults();
        for hook in Hook::all().into_iter().filter(|hook| hook.is_exclusive()) {
            assert!(plugins.last_implementor(hook).is_some(), "{hook}");
        }
    }
}
