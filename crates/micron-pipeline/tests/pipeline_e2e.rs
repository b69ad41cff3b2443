//! End-to-end pipeline tests.
//!
//! These tests run requests through the bundled plugins and custom
//! plugins together, checking hook ordering, the error path and the
//! business-function call convention.

use http::{Method, StatusCode};
use micron_core::{Config, Function, MicronError, MicronRequest, ResponseExt};
use micron_pipeline::plugins::{self, csrf, normalize_input};
use micron_pipeline::{Endpoint, FnPlugin, Hook, Pipeline, PipelineFailure, PluginContainer};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Options disabling CSRF checks, so requests need no token.
fn no_csrf() -> Config {
    let mut config = Config::new();
    config.insert(csrf::OPTION.to_string(), json!(false));
    config
}

fn hello() -> Function {
    Function::with_default("hello", "World".to_string(), |name: String| {
        Ok(format!("Hello, {name}!"))
    })
}

fn post(body: &'static str) -> MicronRequest {
    MicronRequest::new(Method::POST, "/hello").with_body(body)
}

fn endpoint(function: Function, config: Config, plugins: PluginContainer) -> Endpoint {
    Endpoint::new("/hello", function, config, Arc::new(plugins)).unwrap()
}

fn call(endpoint: &Endpoint, body: &'static str) -> (StatusCode, Value) {
    let response = Pipeline::new().process(endpoint, post(body)).unwrap();
    (response.status(), response.json_value().unwrap())
}

// ============================================================================
// Business function convention
// ============================================================================

#[test]
fn test_hello_world_with_default() {
    let endpoint = endpoint(hello(), no_csrf(), plugins::defaults());
    assert_eq!(call(&endpoint, ""), (StatusCode::OK, json!("Hello, World!")));
    assert_eq!(call(&endpoint, "null"), (StatusCode::OK, json!("Hello, World!")));
}

#[test]
fn test_input_is_normalized() {
    let endpoint = endpoint(hello(), no_csrf(), plugins::defaults());
    assert_eq!(
        call(&endpoint, r#""  Jacky\t\n ""#),
        (StatusCode::OK, json!("Hello, Jacky!"))
    );
}

#[test]
fn test_whitespace_input_falls_back_to_default() {
    let endpoint = endpoint(hello(), no_csrf(), plugins::defaults());
    assert_eq!(call(&endpoint, r#""   ""#), (StatusCode::OK, json!("Hello, World!")));
    assert_eq!(call(&endpoint, r#""""#), (StatusCode::OK, json!("Hello, World!")));
}

#[test]
fn test_normalize_disabled_passes_raw_strings() {
    let mut config = no_csrf();
    config.insert(normalize_input::NORMALIZE.to_string(), json!(false));
    let endpoint = endpoint(hello(), config, plugins::defaults());

    assert_eq!(
        call(&endpoint, r#""  Jacky ""#),
        (StatusCode::OK, json!("Hello,   Jacky !"))
    );
}

#[test]
fn test_unexpected_input() {
    let function = Function::nullary("ping", || Ok("pong"));
    let endpoint = endpoint(function, no_csrf(), plugins::defaults());

    let (status, body) = call(&endpoint, r#""surprise""#);
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "UnexpectedInput");
    assert_eq!(body["caused_by"], "client");
    assert_eq!(body["details"], json!({}));
    assert_eq!(body["trace"], json!([]));
}

#[test]
fn test_missing_input() {
    let function = Function::unary("echo", |value: Value| Ok(value));
    let endpoint = endpoint(function, no_csrf(), plugins::defaults());

    let (status, body) = call(&endpoint, "  ");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "MissingInput");
}

#[test]
fn test_non_json_input() {
    let endpoint = endpoint(hello(), no_csrf(), plugins::defaults());
    let (_, body) = call(&endpoint, "{oops");
    assert_eq!(body["code"], "NonJsonInput");
    assert_eq!(body["caused_by"], "client");
}

#[test]
fn test_unhandled_error_in_function() {
    let function = Function::nullary("parse", || {
        let number: i32 = "forty-two".parse()?;
        Ok(number)
    });
    let endpoint = endpoint(function, no_csrf(), plugins::defaults());

    let (status, body) = call(&endpoint, "");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "UnhandledException");
    assert_eq!(body["caused_by"], "server");
    assert_eq!(body["details"]["error_type"], "ParseIntError");
}

// ============================================================================
// Hook ordering
// ============================================================================

type Log = Arc<Mutex<Vec<String>>>;

fn recorder(name: &'static str, log: &Log) -> FnPlugin {
    let entry = move |hook: Hook| {
        let log = Arc::clone(log);
        move || log.lock().unwrap().push(format!("{name}:{hook}"))
    };
    let (start, check, end) = (
        entry(Hook::StartRequest),
        entry(Hook::CheckAccess),
        entry(Hook::EndRequest),
    );
    let read = entry(Hook::ReadInput);
    FnPlugin::new(name)
        .on_start_request(move |_| {
            start();
            Ok(())
        })
        .on_check_access(move |_| {
            check();
            Ok(())
        })
        .on_read_input(move |_| {
            read();
            Ok(Value::Null)
        })
        .on_end_request(move |_| {
            end();
            Ok(())
        })
}

#[test]
fn test_additive_in_order_exclusive_last_wins() {
    let log: Log = Arc::default();
    let mut container = plugins::defaults();
    container
        .add(recorder("first", &log))
        .add(FnPlugin::new("bystander").on_process_output(|_| Ok(())))
        .add(recorder("second", &log));

    let endpoint = endpoint(hello(), no_csrf(), container);
    assert_eq!(call(&endpoint, r#""ignored""#), (StatusCode::OK, json!("Hello, World!")));

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "first:start_request",
            "second:start_request",
            "first:check_access",
            "second:check_access",
            "second:read_input",
            "first:end_request",
            "second:end_request",
        ]
    );
}

#[test]
fn test_later_plugin_shadows_exclusive_hook() {
    let mut container = plugins::defaults();
    container.add(FnPlugin::new("constant").on_call_function(|_| Ok(json!("shadowed"))));

    let endpoint = endpoint(hello(), no_csrf(), container);
    assert_eq!(call(&endpoint, ""), (StatusCode::OK, json!("shadowed")));
}

// ============================================================================
// end_request and the error path
// ============================================================================

fn counting_teardown(counter: &Arc<AtomicUsize>) -> FnPlugin {
    let counter = Arc::clone(counter);
    FnPlugin::new("teardown").on_end_request(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

#[test]
fn test_end_request_runs_once_on_success() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut container = plugins::defaults();
    container.add(counting_teardown(&counter));

    call(&endpoint(hello(), no_csrf(), container), "");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_end_request_runs_once_on_each_failure_stage() {
    for failing in [
        Hook::StartRequest,
        Hook::CheckAccess,
        Hook::AfterCheckAccess,
        Hook::NormalizeInput,
        Hook::ValidateInput,
        Hook::ProcessOutput,
        Hook::ProcessResponse,
    ] {
        let counter = Arc::new(AtomicUsize::new(0));
        let fail = move |ctx: &micron_pipeline::PluginContext, hook: Hook| {
            if hook == failing && !ctx.has_error() {
                Err(MicronError::server("Injected", "Injected failure."))
            } else {
                Ok(())
            }
        };
        let mut container = plugins::defaults();
        container
            .add(
                FnPlugin::new("injector")
                    .on_start_request(move |ctx| fail(ctx, Hook::StartRequest))
                    .on_check_access(move |ctx| fail(ctx, Hook::CheckAccess))
                    .on_after_check_access(move |ctx| fail(ctx, Hook::AfterCheckAccess))
                    .on_normalize_input(move |ctx| fail(ctx, Hook::NormalizeInput))
                    .on_validate_input(move |ctx| fail(ctx, Hook::ValidateInput))
                    .on_process_output(move |ctx| fail(ctx, Hook::ProcessOutput))
                    .on_process_response(move |ctx| fail(ctx, Hook::ProcessResponse)),
            )
            .add(counting_teardown(&counter));

        let (status, body) = call(&endpoint(hello(), no_csrf(), container), "");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{failing}");
        assert_eq!(body["code"], "Injected", "{failing}");
        assert_eq!(counter.load(Ordering::SeqCst), 1, "{failing}");
    }
}

#[test]
fn test_process_error_sees_error_and_runs_in_order() {
    let log: Log = Arc::default();
    let (first, second) = (Arc::clone(&log), Arc::clone(&log));
    let mut container = plugins::defaults();
    container
        .add(FnPlugin::new("deny").on_check_access(|_| Err(MicronError::access_denied())))
        .add(FnPlugin::new("a").on_process_error(move |ctx| {
            let code = ctx.error().map(MicronError::code).unwrap_or_default();
            first.lock().unwrap().push(format!("a:{code}"));
            Ok(())
        }))
        .add(FnPlugin::new("b").on_process_error(move |ctx| {
            assert_eq!(ctx.output()["code"], "AccessDenied");
            assert!(ctx.response().is_some());
            second.lock().unwrap().push("b".to_string());
            Ok(())
        }));

    let (_, body) = call(&endpoint(hello(), no_csrf(), container), "");
    assert_eq!(body["code"], "AccessDenied");
    assert_eq!(*log.lock().unwrap(), vec!["a:AccessDenied", "b"]);
}

#[test]
fn test_process_error_failure_is_fatal_but_teardown_runs() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut container = plugins::defaults();
    container
        .add(FnPlugin::new("deny").on_check_access(|_| Err(MicronError::access_denied())))
        .add(FnPlugin::new("broken").on_process_error(|_| {
            Err(MicronError::server("Broken", "Broken error handler."))
        }))
        .add(counting_teardown(&counter));

    let failure = Pipeline::new()
        .process(&endpoint(hello(), no_csrf(), container), post(""))
        .unwrap_err();

    assert!(matches!(
        failure,
        PipelineFailure::ErrorHandling { hook: Hook::ProcessError, .. }
    ));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_teardown_sees_error_after_fatal_failure() {
    let saw_error = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&saw_error);
    let mut container = plugins::defaults();
    container
        .add(FnPlugin::new("deny").on_check_access(|_| Err(MicronError::access_denied())))
        .add(FnPlugin::new("broken").on_process_error(|_| {
            Err(MicronError::server("Broken", "Broken error handler."))
        }))
        .add(FnPlugin::new("teardown").on_end_request(move |ctx| {
            seen.store(ctx.has_error(), Ordering::SeqCst);
            Ok(())
        }));

    let failure = Pipeline::new()
        .process(&endpoint(hello(), no_csrf(), container), post(""))
        .unwrap_err();

    assert!(saw_error.load(Ordering::SeqCst));
    match failure {
        PipelineFailure::ErrorHandling { error, original, .. } => {
            assert_eq!(error.code(), "Broken");
            assert_eq!(original.unwrap().code(), "AccessDenied");
        }
        other => panic!("unexpected failure: {other}"),
    }
}

// ============================================================================
// Panics
// ============================================================================

#[test]
fn test_panic_in_function_is_unhandled_and_teardown_runs() {
    let counter = Arc::new(AtomicUsize::new(0));
    let function = Function::nullary("boom", || {
        let items: Vec<i32> = Vec::new();
        Ok(items[3])
    });
    let mut container = plugins::defaults();
    container.add(counting_teardown(&counter));

    let (status, body) = call(&endpoint(function, no_csrf(), container), "");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "UnhandledException");
    assert_eq!(body["caused_by"], "server");
    assert_eq!(body["details"]["error_type"], "panic");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panic_in_plugin_hook_takes_error_path() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut container = plugins::defaults();
    container
        .add(FnPlugin::new("gate").on_check_access(|_| panic!("gate exploded")))
        .add(counting_teardown(&counter));

    let (status, body) = call(&endpoint(hello(), no_csrf(), container), "");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "UnhandledException");
    assert_eq!(body["details"]["error_message"], "gate exploded");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panic_in_end_request_is_fatal() {
    let mut container = plugins::defaults();
    container.add(FnPlugin::new("teardown").on_end_request(|_| panic!("teardown exploded")));

    let failure = Pipeline::new()
        .process(&endpoint(hello(), no_csrf(), container), post(""))
        .unwrap_err();

    match failure {
        PipelineFailure::EndRequest { error } => {
            assert_eq!(error.code(), "UnhandledException");
            assert_eq!(error.details().unwrap()["error_type"], "panic");
        }
        other => panic!("unexpected failure: {other}"),
    }
}

#[test]
fn test_csrf_token_is_issued_on_error_responses() {
    let endpoint = endpoint(hello(), Config::new(), plugins::defaults());
    let response = Pipeline::new().process(&endpoint, post("")).unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json_value().unwrap()["code"], "CsrfTokenRequired");
    assert!(response.headers().contains_key(csrf::CSRF_TOKEN_HEADER));
}
