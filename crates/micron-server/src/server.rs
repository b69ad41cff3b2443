//! HTTP server serving a [`Micron`] registry.

use crate::error::ServerError;
use crate::sessions::SessionStore;
use crate::shutdown::ShutdownSignal;
use bytes::Bytes;
use http::{header, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use micron::core::JSON_CONTENT_TYPE;
use micron::{Micron, MicronError, MicronRequest};
use micron_config::ServerSettings;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

/// Response type produced by the server.
pub type HttpResponse = Response<Full<Bytes>>;

/// Time in-flight connections get to finish after shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Error code of the body answered for an unknown rule.
pub const NOT_FOUND_CODE: &str = "NotFound";

/// Error code of the body answered when the pipeline fails fatally.
pub const INTERNAL_ERROR_CODE: &str = "InternalServerError";

/// An HTTP/1.1 server dispatching requests to a [`Micron`] registry.
///
/// The request path is the rule. Each client gets a session identified
/// by the session cookie; the server creates it on the first request and
/// returns it with `Set-Cookie`. Pipelines run on the blocking pool, so
/// business functions may block.
///
/// # Example
///
/// ```rust,no_run
/// use micron::{Function, Micron};
/// use micron_config::ServerSettings;
/// use micron_server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut micron = Micron::new();
///     micron
///         .method(Function::unary("double", |n: i64| Ok(n * 2)))
///         .register()
///         .map_err(|e| e.to_string())?;
///
///     Server::new(micron, &ServerSettings::default()).run().await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    micron: Arc<Micron>,
    sessions: Arc<SessionStore>,
    settings: ServerSettings,
    shutdown_timeout: Duration,
}

impl Server {
    /// Creates a server for `micron`.
    pub fn new(micron: Micron, settings: &ServerSettings) -> Self {
        Self::shared(Arc::new(micron), settings)
    }

    /// Creates a server for a registry shared with other owners.
    pub fn shared(micron: Arc<Micron>, settings: &ServerSettings) -> Self {
        Self {
            micron,
            sessions: Arc::new(SessionStore::new(settings.session_cookie.clone())),
            settings: settings.clone(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Sets how long in-flight connections may run after shutdown.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// The served registry.
    #[must_use]
    pub fn micron(&self) -> &Micron {
        &self.micron
    }

    /// The session store.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The server settings.
    #[must_use]
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Binds the configured address and runs until `shutdown` triggers.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.settings.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from `listener` until `shutdown` triggers.
    ///
    /// After the trigger, open connections finish their current request
    /// and are given the shutdown timeout to close.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "Server listening");

        let server = Arc::new(self);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let server = Arc::clone(&server);
                            let shutdown = shutdown.clone();
                            connections.spawn(async move {
                                if let Err(e) = server.handle_connection(stream, shutdown).await {
                                    tracing::debug!(remote = %remote_addr, error = %e, "Connection error");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to accept connection");
                        }
                    }
                }

                () = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping server");
                    break;
                }
            }

            while connections.try_join_next().is_some() {}
        }

        drop(listener);
        tracing::info!(
            connections = connections.len(),
            timeout_ms = server.shutdown_timeout.as_millis(),
            "Waiting for connections to close"
        );

        let drain = async { while connections.join_next().await.is_some() {} };
        if tokio::time::timeout(server.shutdown_timeout, drain).await.is_err() {
            tracing::warn!(
                connections = connections.len(),
                "Shutdown timeout reached, aborting connections"
            );
            connections.abort_all();
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = self;
        let service = service_fn(move |request: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_incoming(request).await) }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    async fn handle_incoming(&self, request: Request<Incoming>) -> HttpResponse {
        let (parts, body) = request.into_parts();
        match body.collect().await {
            Ok(collected) => self.handle(Request::from_parts(parts, collected.to_bytes())).await,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                error_response(
                    StatusCode::BAD_REQUEST,
                    &MicronError::client("BodyReadError", "The request body could not be read."),
                )
            }
        }
    }

    /// Handles one request with a collected body.
    ///
    /// Answers `404` with a `NotFound` error body for an unknown rule and
    /// `500` with an `InternalServerError` body when the pipeline fails
    /// fatally. Everything else is the pipeline's own response.
    pub async fn handle(&self, request: Request<Bytes>) -> HttpResponse {
        let rule = request.uri().path().to_string();
        if self.micron.endpoint(&rule).is_none() {
            tracing::debug!(endpoint = %rule, "Unknown rule");
            return not_found(&rule);
        }

        let start = Instant::now();
        let resolved = self.sessions.resolve(request.headers());
        let request = MicronRequest::from_http(request, resolved.session.clone());
        let micron = Arc::clone(&self.micron);

        let outcome = tokio::task::spawn_blocking(move || micron.dispatch(request)).await;
        let mut response = match outcome {
            Ok(Some(Ok(response))) => response.map(Full::new),
            Ok(Some(Err(failure))) => {
                tracing::error!(endpoint = %rule, error = %failure, "Pipeline failed");
                internal_error()
            }
            Ok(None) => not_found(&rule),
            Err(e) => {
                tracing::error!(endpoint = %rule, error = %e, "Dispatch task failed");
                internal_error()
            }
        };

        if resolved.created {
            self.sessions.set_cookie(response.headers_mut(), &resolved.id);
        }

        tracing::debug!(
            endpoint = %rule,
            status = response.status().as_u16(),
            duration_ms = start.elapsed().as_millis(),
            "Request served"
        );
        response
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("http_addr", &self.settings.http_addr)
            .field("rules", &self.micron.rules().collect::<Vec<_>>())
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

fn not_found(rule: &str) -> HttpResponse {
    let error = MicronError::client(NOT_FOUND_CODE, "No method is registered for this path.")
        .with_details(json!({ "rule": rule }));
    error_response(StatusCode::NOT_FOUND, &error)
}

fn internal_error() -> HttpResponse {
    let error = MicronError::server(INTERNAL_ERROR_CODE, "The server failed to handle the request.");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, &error)
}

fn error_response(status: StatusCode, error: &MicronError) -> HttpResponse {
    let body = error.to_payload(false).to_value();
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, JSON_CONTENT_TYPE)
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{COOKIE, SET_COOKIE};
    use http::Method;
    use micron::pipeline::plugins::csrf::CSRF_TOKEN_HEADER;
    use micron::{FnPlugin, Function, PING_RULE};
    use serde_json::Value;

    fn micron() -> Micron {
        let mut micron = Micron::new();
        micron
            .method(Function::with_default("hello", "World".to_string(), |name: String| {
                Ok(format!("Hello, {name}!"))
            }))
            .register()
            .unwrap();
        micron
    }

    fn server() -> Server {
        Server::new(micron(), &ServerSettings::default())
    }

    fn post(rule: &str) -> http::request::Builder {
        Request::builder().method(Method::POST).uri(rule)
    }

    async fn body_json(response: HttpResponse) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn session_id(response: &HttpResponse) -> String {
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        let pair = cookie.split(';').next().unwrap();
        pair.strip_prefix("micron_session=").unwrap().to_string()
    }

    #[tokio::test]
    async fn test_ping_creates_session() {
        let server = server();
        let response = server
            .handle(post(PING_RULE).body(Bytes::new()).unwrap())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(CSRF_TOKEN_HEADER));
        let id = session_id(&response);
        assert!(server.sessions().get(&id).is_some());
        assert_eq!(body_json(response).await, json!("pong"));
    }

    #[tokio::test]
    async fn test_session_cookie_carries_csrf_tokens() {
        let server = server();
        let ping = server
            .handle(post(PING_RULE).body(Bytes::new()).unwrap())
            .await;
        let id = session_id(&ping);
        let token = ping.headers()[CSRF_TOKEN_HEADER].to_str().unwrap().to_string();

        let response = server
            .handle(
                post("/hello")
                    .header(COOKIE, format!("micron_session={id}"))
                    .header(CSRF_TOKEN_HEADER, token)
                    .body(Bytes::from_static(b"\"Jacky\""))
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(SET_COOKIE));
        assert_eq!(server.sessions().len(), 1);
        assert_eq!(body_json(response).await, json!("Hello, Jacky!"));
    }

    #[tokio::test]
    async fn test_new_session_has_no_tokens() {
        let server = server();
        let ping = server
            .handle(post(PING_RULE).body(Bytes::new()).unwrap())
            .await;
        let token = ping.headers()[CSRF_TOKEN_HEADER].to_str().unwrap().to_string();

        // Without the cookie the token belongs to another session.
        let response = server
            .handle(
                post("/hello")
                    .header(CSRF_TOKEN_HEADER, token)
                    .body(Bytes::new())
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["code"], "CsrfTokenInvalid");
        assert_eq!(server.sessions().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_rule_is_not_found() {
        let server = server();
        let response = server
            .handle(post("/missing").body(Bytes::new()).unwrap())
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!response.headers().contains_key(SET_COOKIE));
        assert!(server.sessions().is_empty());

        let body = body_json(response).await;
        assert_eq!(body["code"], NOT_FOUND_CODE);
        assert_eq!(body["caused_by"], "client");
        assert_eq!(body["details"]["rule"], "/missing");
    }

    #[tokio::test]
    async fn test_pipeline_failure_is_generic_500() {
        let mut micron = micron();
        micron
            .plugin(FnPlugin::new("teardown").on_end_request(|_| {
                Err(MicronError::server("TeardownFailed", "Teardown failed."))
            }))
            .unwrap();
        let server = Server::new(micron, &ServerSettings::default());

        let response = server
            .handle(post(PING_RULE).body(Bytes::new()).unwrap())
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            JSON_CONTENT_TYPE
        );
        let body = body_json(response).await;
        assert_eq!(body["code"], INTERNAL_ERROR_CODE);
        assert_eq!(body["caused_by"], "server");
        assert_eq!(body["trace"], json!([]));
    }

    #[tokio::test]
    async fn test_custom_cookie_name() {
        let settings = ServerSettings {
            session_cookie: "sid".to_string(),
            ..ServerSettings::default()
        };
        let server = Server::new(micron(), &settings);
        let response = server
            .handle(post(PING_RULE).body(Bytes::new()).unwrap())
            .await;

        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("sid="));
    }

    #[tokio::test]
    async fn test_run_invalid_address() {
        let settings = ServerSettings {
            http_addr: "not-an-address".to_string(),
            ..ServerSettings::default()
        };
        let result = Server::new(micron(), &settings)
            .run_with_shutdown(ShutdownSignal::new())
            .await;

        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[tokio::test]
    async fn test_run_and_shutdown() {
        let settings = ServerSettings {
            http_addr: "127.0.0.1:0".to_string(),
            ..ServerSettings::default()
        };
        let server = Server::new(micron(), &settings).with_shutdown_timeout(Duration::from_millis(100));
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            server.run_with_shutdown(shutdown),
        )
        .await;

        assert!(matches!(result, Ok(Ok(()))));
    }

    #[test]
    fn test_debug_lists_rules() {
        let debug = format!("{:?}", server());
        assert!(debug.contains("/ping"));
        assert!(debug.contains("/hello"));
    }
}
