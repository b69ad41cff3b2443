//! Auth session management.
//!
//! An auth session marks the client behind a session as authenticated,
//! optionally with a list of roles and arbitrary user details. It expires
//! after [`TTL`] seconds without a successful call; every call that passes
//! the access checks resets the timer.
//!
//! ```
//! use micron_core::Session;
//! use micron_pipeline::plugins::auth_session;
//! use serde_json::json;
//!
//! let session = Session::new();
//! auth_session::start(&session, Some(vec!["admin".into()]), json!({"user": "alice"}));
//!
//! assert!(auth_session::is_active(&session));
//! assert!(auth_session::has_role(&session, "admin"));
//! assert!(!auth_session::has_role(&session, "auditor"));
//!
//! auth_session::stop(&session);
//! assert!(!auth_session::is_active(&session));
//! ```

use chrono::Utc;
use micron_core::Session;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Seconds of inactivity after which an auth session expires.
pub const TTL: i64 = 1800;

/// Session key under which the auth session data are stored.
pub const SESSION_KEY: &str = "fm_AS";

/// The data stored for an auth session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Role names granted to the user, if any.
    pub roles: Option<Vec<String>>,
    /// Application-defined details about the user.
    pub details: Value,
    /// Unix time the session was started.
    pub started_at: i64,
    /// Unix time after which the session is expired.
    pub valid_until: i64,
    /// The time to live used when `valid_until` was last set.
    pub ttl: i64,
}

impl AuthSession {
    fn refresh(&mut self, now: i64) {
        self.valid_until = now + TTL;
        self.ttl = TTL;
    }

    /// Returns true when the session has not expired at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.valid_until > now
    }
}

/// Starts an auth session and returns the stored data.
pub fn start(session: &Session, roles: Option<Vec<String>>, details: Value) -> AuthSession {
    let now = Utc::now().timestamp();
    let mut data = AuthSession {
        roles,
        details,
        started_at: now,
        valid_until: now,
        ttl: TTL,
    };
    data.refresh(now);
    store(session, &data);
    data
}

/// Stops the auth session.
pub fn stop(session: &Session) {
    session.set(SESSION_KEY, Value::Null);
}

/// Returns the auth session data when a started, unexpired session exists.
#[must_use]
pub fn get(session: &Session) -> Option<AuthSession> {
    active_in(session.get(SESSION_KEY).as_ref(), Utc::now().timestamp())
}

/// Resets the expiry timer. Returns the updated data, or `None` when no
/// session is active.
///
/// A concurrent [`stop`] is never undone: the read and the write happen
/// under one session lock.
pub fn keep_alive(session: &Session) -> Option<AuthSession> {
    session.update(SESSION_KEY, |stored| {
        let now = Utc::now().timestamp();
        let mut data = active_in(stored.as_ref(), now)?;
        data.refresh(now);
        *stored = Some(serde_json::to_value(&data).ok()?);
        Some(data)
    })
}

/// Returns true when an auth session is started and not expired.
#[must_use]
pub fn is_active(session: &Session) -> bool {
    get(session).is_some()
}

/// Returns true when an active auth session grants `role`.
#[must_use]
pub fn has_role(session: &Session, role: &str) -> bool {
    get(session)
        .and_then(|data| data.roles)
        .is_some_and(|roles| roles.iter().any(|granted| granted == role))
}

fn active_in(stored: Option<&Value>, now: i64) -> Option<AuthSession> {
    let data = AuthSession::deserialize(stored?).ok()?;
    data.is_valid_at(now).then_some(data)
}

fn store(session: &Session, data: &AuthSession) {
    // A struct of strings and integers always serializes.
    if let Ok(value) = serde_json::to_value(data) {
        session.set(SESSION_KEY, value);
    }
}
