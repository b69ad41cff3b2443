//! The Micron method registry.

use http::Method;
use indexmap::IndexMap;
use micron_config::MicronSettings;
use micron_core::config::MethodConfig;
use micron_core::{Config, Function, MicronError, MicronRequest, MicronResult, Response};
use micron_pipeline::plugins::{self, csrf};
use micron_pipeline::{Endpoint, Pipeline, PipelineFailure, Plugin, PluginContainer};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rule of the bootstrap endpoint registered by [`Micron::new`].
pub const PING_RULE: &str = "/ping";

/// A set of Micron methods sharing one plugin stack and one global
/// configuration.
///
/// ```
/// use micron::{Function, Micron, MicronRequest};
/// use http::Method;
///
/// let mut micron = Micron::new();
/// micron
///     .method(Function::with_default("hello", "World".to_string(), |name: String| {
///         Ok(format!("Hello, {name}!"))
///     }))
///     .option("csrf", false)
///     .register()
///     .unwrap();
///
/// let response = micron
///     .dispatch(MicronRequest::new(Method::POST, "/hello"))
///     .unwrap()
///     .unwrap();
/// assert_eq!(response.status(), 200);
/// ```
#[derive(Debug)]
pub struct Micron {
    config: Arc<MethodConfig>,
    plugins: Arc<PluginContainer>,
    pipeline: Pipeline,
    endpoints: IndexMap<String, Arc<Endpoint>>,
}

impl Default for Micron {
    fn default() -> Self {
        Self::new()
    }
}

impl Micron {
    /// Creates a registry with the bundled plugins and the `/ping`
    /// bootstrap endpoint.
    #[must_use]
    pub fn new() -> Self {
        // The bundled stack accepts POST for every endpoint.
        Self::with_plugins(plugins::defaults()).expect("bundled plugins accept the ping endpoint")
    }

    /// Creates a registry with a custom plugin stack and the `/ping`
    /// bootstrap endpoint.
    ///
    /// Fails if the stack rejects the ping endpoint, for example when its
    /// `request_methods` hook returns no methods.
    pub fn with_plugins(plugins: PluginContainer) -> MicronResult<Self> {
        let mut micron = Self {
            config: Arc::new(MethodConfig::new()),
            plugins: Arc::new(plugins),
            pipeline: Pipeline::new(),
            endpoints: IndexMap::new(),
        };
        micron.register_ping()?;
        Ok(micron)
    }

    /// Creates a registry configured from loaded settings.
    ///
    /// Applies the debug flag and the global method options.
    pub fn from_settings(settings: &MicronSettings) -> MicronResult<Self> {
        let mut micron = Self::new();
        micron.set_debug(settings.debug);
        micron.configure(&settings.options)?;
        Ok(micron)
    }

    fn register_ping(&mut self) -> MicronResult<()> {
        let ping = Function::nullary("ping", || Ok("pong"));
        let mut overrides = Config::new();
        overrides.insert(csrf::OPTION.to_string(), Value::Bool(false));
        let endpoint = Endpoint::new(PING_RULE, ping, overrides, Arc::clone(&self.plugins))?;
        self.endpoints.insert(PING_RULE.to_string(), Arc::new(endpoint));
        Ok(())
    }

    /// Includes stack traces in error responses when `debug` is set.
    pub fn set_debug(&mut self, debug: bool) -> &mut Self {
        self.pipeline = self.pipeline.with_debug(debug);
        self
    }

    /// Whether error responses include stack traces.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.pipeline.debug()
    }

    /// Sets global options inherited by methods registered afterwards.
    ///
    /// Every option name is validated before any is applied.
    pub fn configure(&mut self, options: &Config) -> MicronResult<&mut Self> {
        Arc::make_mut(&mut self.config).configure(options)?;
        debug!(options = ?options.keys().collect::<Vec<_>>(), "global options configured");
        Ok(self)
    }

    /// The global configuration level.
    #[must_use]
    pub fn config(&self) -> &MethodConfig {
        &self.config
    }

    /// Appends a plugin to the stack.
    ///
    /// Registered endpoints are rebuilt against the new stack, so the
    /// plugin sees every request dispatched afterwards. Fails, leaving the
    /// registry unchanged, when an endpoint would no longer accept any
    /// request method.
    pub fn plugin<P: Plugin>(&mut self, plugin: P) -> MicronResult<&mut Self> {
        let name = plugin.name();
        let mut stack = PluginContainer::clone(&self.plugins);
        stack.add(plugin);
        let stack = Arc::new(stack);

        let endpoints = self
            .endpoints
            .iter()
            .map(|(rule, endpoint)| -> MicronResult<(String, Arc<Endpoint>)> {
                let rebuilt = endpoint.with_plugins(Arc::clone(&stack))?;
                Ok((rule.clone(), Arc::new(rebuilt)))
            })
            .collect::<MicronResult<IndexMap<_, _>>>()?;

        if self.endpoints.len() > 1 {
            warn!(
                plugin = name,
                endpoints = self.endpoints.len(),
                "plugin added after methods were registered"
            );
        }
        self.plugins = stack;
        self.endpoints = endpoints;
        Ok(self)
    }

    /// The plugin stack.
    #[must_use]
    pub fn plugins(&self) -> &PluginContainer {
        &self.plugins
    }

    /// Starts registering a business function.
    ///
    /// The rule defaults to `/<function name>`.
    pub fn method(&mut self, function: Function) -> MethodBuilder<'_> {
        MethodBuilder {
            rule: format!("/{}", function.name()),
            micron: self,
            function,
            overrides: Config::new(),
        }
    }

    fn register(
        &mut self,
        rule: String,
        function: Function,
        overrides: &Config,
    ) -> MicronResult<Arc<Endpoint>> {
        if !rule.starts_with('/') {
            return Err(MicronError::implementation(format!(
                "Rule '{rule}' must start with '/'"
            )));
        }
        if self.endpoints.contains_key(&rule) {
            return Err(MicronError::implementation(format!(
                "Rule '{rule}' is already registered"
            )));
        }

        let mut method_config = MethodConfig::with_parent(Arc::clone(&self.config));
        method_config.configure(overrides)?;

        let endpoint = Arc::new(Endpoint::new(
            rule.as_str(),
            function,
            method_config.flattened(),
            Arc::clone(&self.plugins),
        )?);
        info!(
            endpoint = %rule,
            function = endpoint.function().name(),
            methods = ?endpoint.request_methods(),
            "method registered"
        );
        self.endpoints.insert(rule, Arc::clone(&endpoint));
        Ok(endpoint)
    }

    /// Looks up an endpoint by rule.
    #[must_use]
    pub fn endpoint(&self, rule: &str) -> Option<&Arc<Endpoint>> {
        self.endpoints.get(rule)
    }

    /// Registered rules, in registration order.
    pub fn rules(&self) -> impl Iterator<Item = &str> + '_ {
        self.endpoints.keys().map(String::as_str)
    }

    /// The request methods a rule accepts, for host routers.
    #[must_use]
    pub fn request_methods(&self, rule: &str) -> Option<&[Method]> {
        self.endpoint(rule).map(|endpoint| endpoint.request_methods())
    }

    /// Runs a request through the pipeline of the endpoint matching its
    /// rule.
    ///
    /// Returns `None` for an unknown rule so the host can answer with its
    /// own not-found response.
    pub fn dispatch(&self, request: MicronRequest) -> Option<Result<Response, PipelineFailure>> {
        let endpoint = self.endpoints.get(request.rule())?;
        Some(self.pipeline.process(endpoint, request))
    }
}

/// Registration of one business function, created by [`Micron::method`].
#[must_use = "a method is only registered once `register` is called"]
pub struct MethodBuilder<'a> {
    micron: &'a mut Micron,
    function: Function,
    rule: String,
    overrides: Config,
}

impl MethodBuilder<'_> {
    /// Sets the route rule.
    pub fn rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = rule.into();
        self
    }

    /// Overrides one option for this method.
    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    /// Overrides several options for this method.
    pub fn options(mut self, options: Config) -> Self {
        self.overrides.extend(options);
        self
    }

    /// Validates and registers the method.
    ///
    /// # Errors
    ///
    /// Returns an `ImplementationError` for a bad rule, a duplicate rule,
    /// an invalid option name, a function Micron cannot call, or a
    /// configuration that accepts no request method.
    pub fn register(self) -> MicronResult<Arc<Endpoint>> {
        let Self {
            micron,
            function,
            rule,
            overrides,
        } = self;
        micron.register(rule, function, &overrides)
    }
}
