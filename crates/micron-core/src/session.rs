//! Per-client session storage handed to the pipeline by the host.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// A cloneable handle to one client's session data.
///
/// Clones share the same underlying map, so a plugin writing to the
/// session of the current request makes the value visible to the host,
/// which persists it between requests.
#[derive(Clone, Default)]
pub struct Session {
    data: Arc<Mutex<Map<String, Value>>>,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session holding `data`.
    #[must_use]
    pub fn from_map(data: Map<String, Value>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
        }
    }

    /// Returns a copy of the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.lock().get(key).cloned()
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.lock().insert(key.into(), value)
    }

    /// Removes the value stored under `key`.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.data.lock().remove(key)
    }

    /// Reads and rewrites the value under `key` while holding the lock.
    ///
    /// `update` sees `None` when nothing is stored. Leaving `None` in the
    /// slot removes the key. Concurrent updates of one session never
    /// lose a write.
    pub fn update<R>(&self, key: &str, update: impl FnOnce(&mut Option<Value>) -> R) -> R {
        let mut data = self.data.lock();
        let mut slot = data.get(key).cloned();
        let result = update(&mut slot);
        match slot {
            Some(value) => {
                data.insert(key.to_string(), value);
            }
            None => {
                data.remove(key);
            }
        }
        result
    }

    /// Checks whether a value is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Returns `true` when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    /// Returns a copy of all session data.
    #[must_use]
    pub fn snapshot(&self) -> Map<String, Value> {
        self.data.lock().clone()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.data.lock().keys().cloned().collect();
        f.debug_struct("Session").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_remove() {
        let session = Session::new();
        assert!(session.is_empty());

        assert_eq!(session.set("fm_CT", json!(["a"])), None);
        assert!(session.contains("fm_CT"));
        assert_eq!(session.get("fm_CT"), Some(json!(["a"])));

        assert_eq!(session.remove("fm_CT"), Some(json!(["a"])));
        assert!(!session.contains("fm_CT"));
    }

    #[test]
    fn test_clones_share_data() {
        let session = Session::new();
        let handle = session.clone();
        handle.set("user", json!("alice"));
        assert_eq!(session.get("user"), Some(json!("alice")));
        assert_eq!(session.snapshot().len(), 1);
    }

    #[test]
    fn test_update_inserts_rewrites_and_removes() {
        let session = Session::new();

        let seen = session.update("count", |slot| {
            let seen = slot.clone();
            *slot = Some(json!(1));
            seen
        });
        assert_eq!(seen, None);
        assert_eq!(session.get("count"), Some(json!(1)));

        session.update("count", |slot| *slot = slot.take().map(|v| json!(v.as_i64().unwrap() + 1)));
        assert_eq!(session.get("count"), Some(json!(2)));

        session.update("count", |slot| *slot = None);
        assert!(!session.contains("count"));
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let session = Session::new();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let session = session.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        session.update("count", |slot| {
                            let count = slot.as_ref().and_then(Value::as_u64).unwrap_or(0);
                            *slot = Some(json!(count + 1));
                        });
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(session.get("count"), Some(json!(8000)));
    }

    #[test]
    fn test_debug_lists_keys_only() {
        let session = Session::from_map(json!({"secret": "value"}).as_object().cloned().unwrap());
        let debug = format!("{session:?}");
        assert!(debug.contains("secret"));
        assert!(!debug.contains("value\""));
    }
}
