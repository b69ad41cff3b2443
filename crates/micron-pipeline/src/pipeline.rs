//! The pipeline executor.
//!
//! [`Pipeline::process`] drives one request through a fixed sequence of
//! hooks. There is no nesting of handlers: a single driver walks an
//! explicit list of stages and calls into the plugin container for each.
//!
//! ## Stages
//!
//! | # | Hook | Kind | Effect |
//! |---|------|------|--------|
//! | 1 | `request_methods` | exclusive | reject a request method the endpoint does not accept |
//! | 2 | `start_request` | additive | plugin initialization |
//! | 3 | `check_access` | additive | any plugin may deny |
//! | 4 | `after_check_access` | additive | bookkeeping |
//! | 5 | `read_input` | exclusive | writes `input` |
//! | 6 | `normalize_input` | additive | rewrites `input` |
//! | 7 | `validate_input` | additive | read-only checks |
//! | 8 | `call_function` | exclusive | writes `output` |
//! | 9 | `process_output` | additive | rewrites `output` |
//! | 10 | `create_response` | exclusive | writes `response` |
//! | 11 | `process_response` | additive | final adjustments |
//! | 12 | `end_request` | additive | teardown, always once |
//!
//! ## Error path
//!
//! When a hook in stages 1 to 11 raises, the executor records the error in
//! the context, replaces `output` with the classified error payload and
//! runs `create_response` followed by every `process_error` hook. Processing
//! then rejoins the main sequence at `process_response`.
//!
//! A raise while handling an error (in `create_response` or
//! `process_error` on the error path, or in `process_response` after an
//! error response was built) and a raise in `end_request` are fatal and
//! returned as [`PipelineFailure`].
//!
//! A panic inside a hook or the method body is caught at the hook boundary
//! and treated as a raise of `UnhandledException` with `error_type` `panic`,
//! so `end_request` still runs.

use crate::container::PluginContainer;
use crate::context::PluginContext;
use crate::endpoint::{resolve_request_methods, Endpoint};
use crate::error::PipelineFailure;
use crate::hook::Hook;
use crate::plugin::Plugin;
use micron_core::{MicronError, MicronRequest, MicronResult, Response};
use serde_json::json;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

/// Stages run before the response is final, in order.
pub const REQUEST_SEQUENCE: [Hook; 10] = [
    Hook::RequestMethods,
    Hook::StartRequest,
    Hook::CheckAccess,
    Hook::AfterCheckAccess,
    Hook::ReadInput,
    Hook::NormalizeInput,
    Hook::ValidateInput,
    Hook::CallFunction,
    Hook::ProcessOutput,
    Hook::CreateResponse,
];

/// Code of the error raised for a request method the endpoint does not accept.
pub const REQUEST_METHOD_NOT_ALLOWED: &str = "RequestMethodNotAllowed";

/// The request executor.
///
/// The executor itself is stateless apart from the debug flag, so one
/// instance can serve all requests concurrently.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pipeline {
    debug: bool,
}

impl Pipeline {
    /// Creates an executor with debug mode off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables debug mode. In debug mode, error payloads
    /// include a trace.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Returns whether debug mode is enabled.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Processes one request for `endpoint`.
    ///
    /// Errors raised by hooks are rendered into the returned response.
    /// Only fatal failures are returned as `Err`.
    pub fn process(
        &self,
        endpoint: &Endpoint,
        request: MicronRequest,
    ) -> Result<Response, PipelineFailure> {
        let span = tracing::info_span!(
            "micron_request",
            endpoint = endpoint.rule(),
            function = endpoint.function().name(),
            method = %request.method(),
        );
        let _entered = span.enter();

        let plugins = endpoint.plugins();
        let mut ctx = PluginContext::new(
            endpoint.function().clone(),
            endpoint.config().clone(),
            request,
        );

        let mut outcome = self.run_request(plugins, &mut ctx);
        let teardown = run_hook(plugins, Hook::EndRequest, &mut ctx);
        // The error stays in the context until teardown has seen it.
        if let Err(PipelineFailure::ErrorHandling { original, .. }) = &mut outcome {
            *original = ctx.take_error();
        }

        let result = match (outcome, teardown) {
            (Err(failure), Err(teardown_error)) => {
                error!(
                    code = teardown_error.code(),
                    "end_request hook also failed after a fatal failure"
                );
                Err(failure)
            }
            (Err(failure), Ok(())) => Err(failure),
            (Ok(()), Err(error)) => Err(PipelineFailure::EndRequest { error }),
            (Ok(()), Ok(())) => ctx.take_response().ok_or(PipelineFailure::MissingResponse),
        };

        let duration_ms = ctx.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(response) => info!(
                status = response.status().as_u16(),
                duration_ms,
                "request completed"
            ),
            Err(failure) => error!(error = %failure, duration_ms, "request failed fatally"),
        }
        result
    }

    fn run_request(
        &self,
        plugins: &PluginContainer,
        ctx: &mut PluginContext,
    ) -> Result<(), PipelineFailure> {
        let main = REQUEST_SEQUENCE
            .iter()
            .try_for_each(|&hook| run_hook(plugins, hook, ctx));
        if let Err(error) = main {
            return self.recover(plugins, ctx, error);
        }
        match run_hook(plugins, Hook::ProcessResponse, ctx) {
            Ok(()) => Ok(()),
            Err(error) => self.recover(plugins, ctx, error),
        }
    }

    /// Renders `error` into a response and rejoins at `process_response`.
    fn recover(
        &self,
        plugins: &PluginContainer,
        ctx: &mut PluginContext,
        error: MicronError,
    ) -> Result<(), PipelineFailure> {
        warn!(
            code = error.code(),
            caused_by = %error.caused_by(),
            description = error.description(),
            "request raised an error"
        );
        ctx.set_output(error.to_payload(self.debug).to_value());
        ctx.set_error(error);

        for hook in [Hook::CreateResponse, Hook::ProcessError, Hook::ProcessResponse] {
            if let Err(error) = run_hook(plugins, hook, ctx) {
                return Err(PipelineFailure::ErrorHandling {
                    hook,
                    error,
                    original: None,
                });
            }
        }
        Ok(())
    }
}

/// Runs one hook, turning a panic into an unhandled error.
fn run_hook(plugins: &PluginContainer, hook: Hook, ctx: &mut PluginContext) -> MicronResult<()> {
    catch_unwind(AssertUnwindSafe(|| dispatch_hook(plugins, hook, ctx))).unwrap_or_else(
        |payload| {
            error!(hook = hook.name(), "hook panicked");
            Err(MicronError::from_panic(payload.as_ref()))
        },
    )
}

/// Calls the last implementor for exclusive hooks, every implementor in
/// registration order for additive hooks.
fn dispatch_hook(
    plugins: &PluginContainer,
    hook: Hook,
    ctx: &mut PluginContext,
) -> MicronResult<()> {
    if hook == Hook::RequestMethods {
        return check_request_method(plugins, ctx);
    }
    if hook.is_exclusive() {
        if let Some(plugin) = plugins.last_implementor(hook) {
            debug!(hook = hook.name(), plugin = plugin.name(), "calling hook");
            run_exclusive(plugin, hook, ctx)?;
        }
        return Ok(());
    }
    for plugin in plugins.implementors(hook) {
        debug!(hook = hook.name(), plugin = plugin.name(), "calling hook");
        run_additive(plugin, hook, ctx)?;
    }
    Ok(())
}

fn check_request_method(plugins: &PluginContainer, ctx: &PluginContext) -> MicronResult<()> {
    let allowed = resolve_request_methods(plugins, ctx.config())?;
    let method = ctx.request().method();
    if allowed.contains(method) {
        return Ok(());
    }
    let allowed: Vec<&str> = allowed.iter().map(http::Method::as_str).collect();
    Err(MicronError::client(
        REQUEST_METHOD_NOT_ALLOWED,
        "The request method is not accepted by the requested method.",
    )
    .with_details(json!({
        "method": method.as_str(),
        "allowed": allowed,
    })))
}

fn run_exclusive(plugin: &dyn Plugin, hook: Hook, ctx: &mut PluginContext) -> MicronResult<()> {
    match hook {
        Hook::ReadInput => {
            let input = plugin.read_input(ctx)?;
            ctx.set_input(input);
        }
        Hook::CallFunction => {
            let output = plugin.call_function(ctx)?;
            ctx.set_output(output);
        }
        Hook::CreateResponse => {
            let response = plugin.create_response(ctx)?;
            ctx.set_response(response);
        }
        other => {
            return Err(MicronError::implementation(format!(
                "'{other}' is not an exclusive hook with a context field"
            )))
        }
    }
    Ok(())
}

fn run_additive(plugin: &dyn Plugin, hook: Hook, ctx: &mut PluginContext) -> MicronResult<()> {
    match hook {
        Hook::StartRequest => plugin.start_request(ctx),
        Hook::CheckAccess => plugin.check_access(ctx),
        Hook::AfterCheckAccess => plugin.after_check_access(ctx),
        Hook::NormalizeInput => plugin.normalize_input(ctx),
        Hook::ValidateInput => plugin.validate_input(ctx),
        Hook::ProcessOutput => plugin.process_output(ctx),
        Hook::ProcessError => plugin.process_error(ctx),
        Hook::ProcessResponse => plugin.process_response(ctx),
        Hook::EndRequest => plugin.end_request(ctx),
        other => Err(MicronError::implementation(format!(
            "'{other}' is not an additive hook"
        ))),
    }
}
