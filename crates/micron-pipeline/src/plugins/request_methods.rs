//! Request methods plugin: Micron methods accept `POST` only.

use crate::hook::{Hook, HookSet};
use crate::plugin::Plugin;
use http::Method;
use micron_core::{Config, MicronResult};

/// The request methods plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestMethodsPlugin;

impl RequestMethodsPlugin {
    /// Creates the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for RequestMethodsPlugin {
    fn name(&self) -> &'static str {
        "request_methods"
    }

    fn hooks(&self) -> HookSet {
        HookSet::EMPTY.with(Hook::RequestMethods)
    }

    fn request_methods(&self, _config: &Config) -> MicronResult<Vec<Method>> {
        Ok(vec![Method::POST])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_only() {
        assert_eq!(
            RequestMethodsPlugin.request_methods(&Config::new()).unwrap(),
            vec![Method::POST]
        );
    }
}
