//! Endpoint definitions.

use crate::container::PluginContainer;
use crate::hook::Hook;
use http::Method;
use micron_core::{Config, Function, MicronError, MicronResult};
use std::sync::Arc;

/// A registered business function with its effective configuration and
/// the plugins that process its requests.
///
/// Endpoints are created once at registration and never mutated.
#[derive(Debug, Clone)]
pub struct Endpoint {
    rule: String,
    function: Function,
    config: Config,
    plugins: Arc<PluginContainer>,
    request_methods: Vec<Method>,
}

impl Endpoint {
    /// Creates an endpoint.
    ///
    /// Fails fast when the function signature cannot be called by Micron
    /// or when the configuration accepts no request method at all.
    pub fn new(
        rule: impl Into<String>,
        function: Function,
        config: Config,
        plugins: Arc<PluginContainer>,
    ) -> MicronResult<Self> {
        function.signature().validate(function.name())?;
        let request_methods = resolve_request_methods(&plugins, &config)?;
        Ok(Self {
            rule: rule.into(),
            function,
            config,
            plugins,
            request_methods,
        })
    }

    /// Returns a copy of this endpoint processed by another set of plugins.
    pub fn with_plugins(&self, plugins: Arc<PluginContainer>) -> MicronResult<Self> {
        Self::new(
            self.rule.clone(),
            self.function.clone(),
            self.config.clone(),
            plugins,
        )
    }

    /// The route rule.
    #[must_use]
    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// The wrapped business function.
    #[must_use]
    pub fn function(&self) -> &Function {
        &self.function
    }

    /// The effective (merged) configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The plugins processing requests for this endpoint.
    #[must_use]
    pub fn plugins(&self) -> &PluginContainer {
        &self.plugins
    }

    /// The request methods resolved at registration, for the host router.
    #[must_use]
    pub fn request_methods(&self) -> &[Method] {
        &self.request_methods
    }
}

/// Asks the last `request_methods` implementor which methods `config`
/// accepts. Without an implementor, only `POST` is accepted.
pub(crate) fn resolve_request_methods(
    plugins: &PluginContainer,
    config: &Config,
) -> MicronResult<Vec<Method>> {
    let methods = match plugins.last_implementor(Hook::RequestMethods) {
        Some(plugin) => plugin.request_methods(config)?,
        None => vec![Method::POST],
    };
    if methods.is_empty() {
        return Err(MicronError::implementation(
            "The request_methods hook returned no request methods",
        ));
    }
    Ok(methods)
}
