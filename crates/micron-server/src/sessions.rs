//! Cookie-keyed session store.

use dashmap::DashMap;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use micron::Session;
use uuid::Uuid;

/// The session resolved for one request.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    /// Session id, the value of the session cookie.
    pub id: String,
    /// Session handle shared with the store.
    pub session: Session,
    /// True if the session was created for this request.
    pub created: bool,
}

/// In-memory sessions keyed by the value of the session cookie.
///
/// Ids are only ever issued by the store. A cookie naming an unknown id
/// (a forged value, or one issued before a restart) gets a fresh session
/// under a new id.
#[derive(Debug)]
pub struct SessionStore {
    cookie_name: String,
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    /// Creates an empty store reading the cookie `cookie_name`.
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            sessions: DashMap::new(),
        }
    }

    /// Name of the session cookie.
    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Finds the session named by the request's cookie, or creates one.
    pub fn resolve(&self, headers: &HeaderMap) -> ResolvedSession {
        if let Some(id) = cookie_value(headers, &self.cookie_name) {
            if let Some(session) = self.sessions.get(id) {
                return ResolvedSession {
                    id: id.to_string(),
                    session: session.value().clone(),
                    created: false,
                };
            }
        }

        let id = Uuid::new_v4().simple().to_string();
        let session = Session::new();
        self.sessions.insert(id.clone(), session.clone());
        tracing::debug!(session_id = %id, "Session created");
        ResolvedSession {
            id,
            session,
            created: true,
        }
    }

    /// Returns the session stored under `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Drops the session stored under `id`.
    pub fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no session exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Adds the `Set-Cookie` header for session `id`.
    pub fn set_cookie(&self, headers: &mut HeaderMap, id: &str) {
        let cookie = format!("{}={id}; Path=/; HttpOnly; SameSite=Lax", self.cookie_name);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "Invalid session cookie"),
        }
    }
}

/// Reads cookie `name` from the `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_cookie_value() {
        let headers = with_cookie("theme=dark; micron_session=abc123; lang=en");
        assert_eq!(cookie_value(&headers, "micron_session"), Some("abc123"));
        assert_eq!(cookie_value(&headers, "lang"), Some("en"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_value_quoted_and_repeated_headers() {
        let mut headers = with_cookie("a=1");
        headers.append(COOKIE, HeaderValue::from_static("micron_session=\"xyz\""));
        assert_eq!(cookie_value(&headers, "micron_session"), Some("xyz"));
    }

    #[test]
    fn test_cookie_name_is_exact() {
        let headers = with_cookie("my_micron_session=abc");
        assert_eq!(cookie_value(&headers, "micron_session"), None);
    }

    #[test]
    fn test_resolve_creates_then_reuses() {
        let store = SessionStore::new("micron_session");
        let first = store.resolve(&HeaderMap::new());
        assert!(first.created);
        assert_eq!(store.len(), 1);

        first.session.set("user", serde_json::json!("jacky"));

        let headers = with_cookie(&format!("micron_session={}", first.id));
        let second = store.resolve(&headers);
        assert!(!second.created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.session.get("user"), Some(serde_json::json!("jacky")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_id_gets_fresh_session() {
        let store = SessionStore::new("micron_session");
        let resolved = store.resolve(&with_cookie("micron_session=forged"));

        assert!(resolved.created);
        assert_ne!(resolved.id, "forged");
        assert!(store.get("forged").is_none());
    }

    #[test]
    fn test_remove() {
        let store = SessionStore::new("sid");
        let resolved = store.resolve(&HeaderMap::new());

        assert!(store.remove(&resolved.id).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_cookie() {
        let store = SessionStore::new("sid");
        let mut headers = HeaderMap::new();
        store.set_cookie(&mut headers, "abc");

        assert_eq!(
            headers.get(SET_COOKIE).unwrap(),
            "sid=abc; Path=/; HttpOnly; SameSite=Lax"
        );
    }
}
