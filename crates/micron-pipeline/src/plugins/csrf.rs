//! CSRF protection plugin.
//!
//! On every response, including error responses, a fresh token is
//! generated, remembered in the client's session and handed to the client
//! in the `X-Micron-CSRF-Token` response header. The client sends the
//! token back in the same request header on its next call. When CSRF
//! checking is enabled for a method (option `csrf`, default `true`), a
//! request without a known token is rejected.
//!
//! A handful of recent tokens stay valid, so concurrent calls from an
//! asynchronous client that reuse a token or arrive out of order are not
//! rejected.
//!
//! ## Bootstrap
//!
//! A first-time client has no token yet. It calls a method with
//! `csrf = false` (Micron registers `/ping` for this) and takes the token
//! from that response:
//!
//! ```text
//! POST /ping                          → 200, X-Micron-CSRF-Token: a858…
//! POST /hello  X-Micron-CSRF-Token: a858…  → 200, X-Micron-CSRF-Token: 7b81…
//! ```

use crate::context::PluginContext;
use crate::hook::{Hook, HookSet};
use crate::plugin::Plugin;
use http::{HeaderName, HeaderValue};
use micron_core::{ConfigExt, MicronError, MicronResult, Session};
use serde_json::Value;
use uuid::Uuid;

/// Header transporting CSRF tokens in both directions.
pub const CSRF_TOKEN_HEADER: &str = "X-Micron-CSRF-Token";

/// Session key under which valid tokens are stored.
pub const SESSION_KEY: &str = "fm_CT";

/// Number of recent tokens kept valid.
pub const MAX_TOKENS: usize = 3;

/// Configuration option enabling the check.
pub const OPTION: &str = "csrf";

/// Error code for a protected call without a token.
pub const CSRF_TOKEN_REQUIRED: &str = "CsrfTokenRequired";

/// Error code for a protected call with an unknown token.
pub const CSRF_TOKEN_INVALID: &str = "CsrfTokenInvalid";

/// The CSRF protection plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsrfPlugin;

impl CsrfPlugin {
    /// Creates the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for CsrfPlugin {
    fn name(&self) -> &'static str {
        "csrf"
    }

    fn hooks(&self) -> HookSet {
        HookSet::EMPTY
            .with(Hook::CheckAccess)
            .with(Hook::ProcessResponse)
    }

    fn check_access(&self, ctx: &PluginContext) -> MicronResult<()> {
        if !ctx.config().flag(OPTION, true) {
            return Ok(());
        }
        let Some(provided) = ctx.request().header_value(CSRF_TOKEN_HEADER) else {
            return Err(MicronError::client(
                CSRF_TOKEN_REQUIRED,
                "A method was called for which CSRF checking is enabled, \
                 but the client did not provide a CSRF token in the request.",
            ));
        };
        // A token that is not valid text cannot match a stored one.
        let known = provided.to_str().is_ok_and(|provided| {
            stored_tokens(ctx.session()).iter().any(|token| token == provided)
        });
        if !known {
            return Err(MicronError::client(
                CSRF_TOKEN_INVALID,
                "A method was called for which CSRF checking is enabled, \
                 but the client provided a CSRF token in the request that \
                 is not valid (anymore).",
            ));
        }
        Ok(())
    }

    fn process_response(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        let token = Uuid::new_v4().to_string();
        store_token(ctx.session(), &token);
        let value = HeaderValue::from_str(&token).map_err(|error| {
            MicronError::implementation(format!("Invalid CSRF token header value: {error}"))
        })?;
        if let Some(response) = ctx.response_mut() {
            response
                .headers_mut()
                .insert(HeaderName::from_static("x-micron-csrf-token"), value);
        }
        Ok(())
    }
}

/// Returns the tokens currently valid for `session`, oldest first.
#[must_use]
pub fn stored_tokens(session: &Session) -> Vec<String> {
    tokens_in(session.get(SESSION_KEY).as_ref())
}

fn tokens_in(stored: Option<&Value>) -> Vec<String> {
    match stored {
        Some(Value::Array(tokens)) => tokens
            .iter()
            .filter_map(|token| token.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn store_token(session: &Session, token: &str) {
    session.update(SESSION_KEY, |stored| {
        let mut tokens = tokens_in(stored.as_ref());
        tokens.push(token.to_string());
        if tokens.len() > MAX_TOKENS {
            tokens.drain(..tokens.len() - MAX_TOKENS);
        }
        *stored = Some(Value::from(tokens));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use micron_core::{Config, Function, MicronRequest, Response, ResponseExt};
    use serde_json::json;

    fn context(request: MicronRequest, config: Config) -> PluginContext {
        PluginContext::new(Function::nullary("f", || Ok(())), config, request)
    }

    fn request() -> MicronRequest {
        MicronRequest::new(Method::POST, "/f")
    }

    #[test]
    fn test_missing_token() {
        let ctx = context(request(), Config::new());
        let error = CsrfPlugin.check_access(&ctx).unwrap_err();
        assert_eq!(error.code(), CSRF_TOKEN_REQUIRED);
        assert!(error.is_client_error());
    }

    #[test]
    fn test_unknown_token() {
        let ctx = context(request().with_header("x-micron-csrf-token", "nope"), Config::new());
        let error = CsrfPlugin.check_access(&ctx).unwrap_err();
        assert_eq!(error.code(), CSRF_TOKEN_INVALID);
    }

    #[test]
    fn test_non_text_token_is_invalid_not_missing() {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-micron-csrf-token"),
            HeaderValue::from_bytes(b"\xfftoken").unwrap(),
        );
        let request = request().with_headers(headers);
        request.session().set(SESSION_KEY, json!(["token"]));
        let ctx = context(request, Config::new());

        let error = CsrfPlugin.check_access(&ctx).unwrap_err();
        assert_eq!(error.code(), CSRF_TOKEN_INVALID);
    }

    #[test]
    fn test_known_token_header_is_case_insensitive() {
        let request = request().with_header("X-MICRON-CSRF-TOKEN", "t1");
        request.session().set(SESSION_KEY, json!(["t0", "t1"]));
        let ctx = context(request, Config::new());
        assert!(CsrfPlugin.check_access(&ctx).is_ok());
    }

    #[test]
    fn test_disabled_by_option() {
        let mut config = Config::new();
        config.insert(OPTION.to_string(), json!(false));
        let ctx = context(request(), config);
        assert!(CsrfPlugin.check_access(&ctx).is_ok());
    }

    #[test]
    fn test_process_response_issues_token() {
        let mut ctx = context(request(), Config::new());
        ctx.set_response(Response::json(StatusCode::OK, &json!("pong")).unwrap());
        CsrfPlugin.process_response(&mut ctx).unwrap();

        let header = ctx.response().unwrap().headers()[CSRF_TOKEN_HEADER]
            .to_str()
            .unwrap()
            .to_string();
        assert!(Uuid::parse_str(&header).is_ok());
        assert_eq!(stored_tokens(ctx.session()), vec![header]);
    }

    #[test]
    fn test_only_recent_tokens_are_kept() {
        let session = Session::new();
        for token in ["a", "b", "c", "d", "e"] {
            store_token(&session, token);
        }
        assert_eq!(stored_tokens(&session), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_concurrent_responses_keep_every_recent_token() {
        let session = Session::new();
        let threads: Vec<_> = (0..MAX_TOKENS)
            .map(|i| {
                let session = session.clone();
                std::thread::spawn(move || store_token(&session, &format!("t{i}")))
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let mut tokens = stored_tokens(&session);
        tokens.sort();
        assert_eq!(tokens, vec!["t0", "t1", "t2"]);
    }

    #[test]
    fn test_garbage_in_session_is_ignored() {
        let session = Session::new();
        session.set(SESSION_KEY, json!("not a list"));
        assert!(stored_tokens(&session).is_empty());
        store_token(&session, "x");
        assert_eq!(stored_tokens(&session), vec!["x"]);
    }
}
