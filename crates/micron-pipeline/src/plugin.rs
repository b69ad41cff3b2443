//! The plugin trait and closure-built plugins.
//!
//! A plugin is a named bundle of hook implementations. Every hook has a
//! method on [`Plugin`] with a default body; a plugin overrides the hooks
//! it cares about and lists them in [`Plugin::hooks`]. The container only
//! calls a hook on plugins whose set contains it.
//!
//! # Example
//!
//! ```
//! use micron_core::{MicronError, MicronResult};
//! use micron_pipeline::{Hook, HookSet, Plugin, PluginContext};
//!
//! /// Rejects every request carrying a `X-Blocked` header.
//! struct Blocklist;
//!
//! impl Plugin for Blocklist {
//!     fn name(&self) -> &'static str {
//!         "blocklist"
//!     }
//!
//!     fn hooks(&self) -> HookSet {
//!         HookSet::EMPTY.with(Hook::CheckAccess)
//!     }
//!
//!     fn check_access(&self, ctx: &PluginContext) -> MicronResult<()> {
//!         match ctx.request().header("X-Blocked") {
//!             Some(_) => Err(MicronError::access_denied()),
//!             None => Ok(()),
//!         }
//!     }
//! }
//! ```

use crate::context::PluginContext;
use crate::hook::{Hook, HookSet};
use http::Method;
use micron_core::{Config, MicronError, MicronResult, Response};
use serde_json::Value;
use std::fmt;

/// A bundle of hook implementations.
///
/// Plugin instances are shared by all concurrent requests. Keep
/// per-request state in the [`PluginContext`], not in the plugin.
///
/// Exclusive hooks return the value the executor stores in the context:
/// `read_input` the input, `call_function` the output, `create_response`
/// the response. Their default bodies report an implementation error, as
/// they are only called on plugins that list them in [`Plugin::hooks`].
pub trait Plugin: Send + Sync + 'static {
    /// Returns the name of this plugin, used in logs.
    fn name(&self) -> &'static str;

    /// Returns the hooks this plugin implements.
    fn hooks(&self) -> HookSet;

    /// Returns the request methods an endpoint with this configuration
    /// accepts.
    fn request_methods(&self, config: &Config) -> MicronResult<Vec<Method>> {
        let _ = config;
        Err(unimplemented_hook(self.name(), Hook::RequestMethods))
    }

    /// Initializes the plugin for a request.
    fn start_request(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Access control. Return an error to deny the request.
    fn check_access(&self, ctx: &PluginContext) -> MicronResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Bookkeeping after access was granted.
    fn after_check_access(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Produces the input value from the raw request.
    fn read_input(&self, ctx: &PluginContext) -> MicronResult<Value> {
        let _ = ctx;
        Err(unimplemented_hook(self.name(), Hook::ReadInput))
    }

    /// Transforms the input value.
    fn normalize_input(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Read-only checks on the input value.
    fn validate_input(&self, ctx: &PluginContext) -> MicronResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Invokes the business function and returns its output.
    fn call_function(&self, ctx: &PluginContext) -> MicronResult<Value> {
        let _ = ctx;
        Err(unimplemented_hook(self.name(), Hook::CallFunction))
    }

    /// Transforms the output value.
    fn process_output(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Builds the response. On the error path the output holds the error
    /// payload and [`PluginContext::error`] is set.
    fn create_response(&self, ctx: &PluginContext) -> MicronResult<Response> {
        let _ = ctx;
        Err(unimplemented_hook(self.name(), Hook::CreateResponse))
    }

    /// Adjusts the response after an error was recorded.
    fn process_error(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Final adjustments to the response.
    fn process_response(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Teardown. Runs exactly once per request, after success or failure.
    fn end_request(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        let _ = ctx;
        Ok(())
    }
}

fn unimplemented_hook(plugin: &str, hook: Hook) -> MicronError {
    MicronError::implementation(format!(
        "Plugin '{plugin}' declares the hook '{hook}' but does not implement it"
    ))
}

type MethodsFn = Box<dyn Fn(&Config) -> MicronResult<Vec<Method>> + Send + Sync>;
type MutFn = Box<dyn Fn(&mut PluginContext) -> MicronResult<()> + Send + Sync>;
type RefFn = Box<dyn Fn(&PluginContext) -> MicronResult<()> + Send + Sync>;
type ValueFn = Box<dyn Fn(&PluginContext) -> MicronResult<Value> + Send + Sync>;
type ResponseFn = Box<dyn Fn(&PluginContext) -> MicronResult<Response> + Send + Sync>;

/// A plugin assembled from closures.
///
/// The hook set is derived from which closures were supplied, so a
/// namespace of free functions becomes a plugin without a dedicated type.
///
/// ```
/// use micron_pipeline::{FnPlugin, Hook, Plugin};
///
/// let plugin = FnPlugin::new("audit")
///     .on_start_request(|_ctx| Ok(()))
///     .on_end_request(|_ctx| Ok(()));
///
/// assert!(plugin.hooks().contains(Hook::EndRequest));
/// assert!(!plugin.hooks().contains(Hook::CheckAccess));
/// ```
#[derive(Default)]
pub struct FnPlugin {
    name: &'static str,
    hooks: HookSet,
    request_methods: Option<MethodsFn>,
    start_request: Option<MutFn>,
    check_access: Option<RefFn>,
    after_check_access: Option<MutFn>,
    read_input: Option<ValueFn>,
    normalize_input: Option<MutFn>,
    validate_input: Option<RefFn>,
    call_function: Option<ValueFn>,
    process_output: Option<MutFn>,
    create_response: Option<ResponseFn>,
    process_error: Option<MutFn>,
    process_response: Option<MutFn>,
    end_request: Option<MutFn>,
}

macro_rules! fn_plugin_setter {
    ($setter:ident, $field:ident, $hook:expr, $alias:ident, $($sig:tt)*) => {
        #[doc = concat!("Implements the `", stringify!($field), "` hook.")]
        #[must_use]
        pub fn $setter<F>(mut self, hook: F) -> Self
        where
            F: $($sig)* + Send + Sync + 'static,
        {
            self.$field = Some(Box::new(hook) as $alias);
            self.hooks.insert($hook);
            self
        }
    };
}

impl FnPlugin {
    /// Creates a plugin that implements no hooks yet.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    fn_plugin_setter!(on_request_methods, request_methods, Hook::RequestMethods, MethodsFn,
        Fn(&Config) -> MicronResult<Vec<Method>>);
    fn_plugin_setter!(on_start_request, start_request, Hook::StartRequest, MutFn,
        Fn(&mut PluginContext) -> MicronResult<()>);
    fn_plugin_setter!(on_check_access, check_access, Hook::CheckAccess, RefFn,
        Fn(&PluginContext) -> MicronResult<()>);
    fn_plugin_setter!(on_after_check_access, after_check_access, Hook::AfterCheckAccess, MutFn,
        Fn(&mut PluginContext) -> MicronResult<()>);
    fn_plugin_setter!(on_read_input, read_input, Hook::ReadInput, ValueFn,
        Fn(&PluginContext) -> MicronResult<Value>);
    fn_plugin_setter!(on_normalize_input, normalize_input, Hook::NormalizeInput, MutFn,
        Fn(&mut PluginContext) -> MicronResult<()>);
    fn_plugin_setter!(on_validate_input, validate_input, Hook::ValidateInput, RefFn,
        Fn(&PluginContext) -> MicronResult<()>);
    fn_plugin_setter!(on_call_function, call_function, Hook::CallFunction, ValueFn,
        Fn(&PluginContext) -> MicronResult<Value>);
    fn_plugin_setter!(on_process_output, process_output, Hook::ProcessOutput, MutFn,
        Fn(&mut PluginContext) -> MicronResult<()>);
    fn_plugin_setter!(on_create_response, create_response, Hook::CreateResponse, ResponseFn,
        Fn(&PluginContext) -> MicronResult<Response>);
    fn_plugin_setter!(on_process_error, process_error, Hook::ProcessError, MutFn,
        Fn(&mut PluginContext) -> MicronResult<()>);
    fn_plugin_setter!(on_process_response, process_response, Hook::ProcessResponse, MutFn,
        Fn(&mut PluginContext) -> MicronResult<()>);
    fn_plugin_setter!(on_end_request, end_request, Hook::EndRequest, MutFn,
        Fn(&mut PluginContext) -> MicronResult<()>);
}

fn run_mut(hook: Option<&MutFn>, ctx: &mut PluginContext) -> MicronResult<()> {
    hook.map_or(Ok(()), |hook| hook(ctx))
}

fn run_ref(hook: Option<&RefFn>, ctx: &PluginContext) -> MicronResult<()> {
    hook.map_or(Ok(()), |hook| hook(ctx))
}

impl Plugin for FnPlugin {
    fn name(&self) -> &'static str {
        self.name
    }

    fn hooks(&self) -> HookSet {
        self.hooks
    }

    fn request_methods(&self, config: &Config) -> MicronResult<Vec<Method>> {
        match &self.request_methods {
            Some(hook) => hook(config),
            None => Err(unimplemented_hook(self.name, Hook::RequestMethods)),
        }
    }

    fn start_request(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        run_mut(self.start_request.as_ref(), ctx)
    }

    fn check_access(&self, ctx: &PluginContext) -> MicronResult<()> {
        run_ref(self.check_access.as_ref(), ctx)
    }

    fn after_check_access(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        run_mut(self.after_check_access.as_ref(), ctx)
    }

    fn read_input(&self, ctx: &PluginContext) -> MicronResult<Value> {
        match &self.read_input {
            Some(hook) => hook(ctx),
            None => Err(unimplemented_hook(self.name, Hook::ReadInput)),
        }
    }

    fn normalize_input(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        run_mut(self.normalize_input.as_ref(), ctx)
    }

    fn validate_input(&self, ctx: &PluginContext) -> MicronResult<()> {
        run_ref(self.validate_input.as_ref(), ctx)
    }

    fn call_function(&self, ctx: &PluginContext) -> MicronResult<Value> {
        match &self.call_function {
            Some(hook) => hook(ctx),
            None => Err(unimplemented_hook(self.name, Hook::CallFunction)),
        }
    }

    fn process_output(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        run_mut(self.process_output.as_ref(), ctx)
    }

    fn create_response(&self, ctx: &PluginContext) -> MicronResult<Response> {
        match &self.create_response {
            Some(hook) => hook(ctx),
            None => Err(unimplemented_hook(self.name, Hook::CreateResponse)),
        }
    }

    fn process_error(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        run_mut(self.process_error.as_ref(), ctx)
    }

    fn process_response(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        run_mut(self.process_response.as_ref(), ctx)
    }

    fn end_request(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        run_mut(self.end_request.as_ref(), ctx)
    }
}

impl fmt::Debug for FnPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPlugin")
            .field("name", &self.name)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
