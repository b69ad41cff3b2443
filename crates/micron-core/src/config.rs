//! Method configuration.
//!
//! Micron configures methods at two levels: options given to the `Micron`
//! instance apply to every method, options given when registering a method
//! override those for that method only. [`MethodConfig`] models one level
//! and links to its parent; [`merge`] flattens two levels into the single
//! [`Config`] map that is stored with an endpoint.
//!
//! ```
//! use micron_core::config::{merge, Config};
//! use serde_json::json;
//!
//! let global: Config = json!({"csrf": false, "option1": "y"}).as_object().cloned().unwrap();
//! let method: Config = json!({"option1": "b"}).as_object().cloned().unwrap();
//!
//! let merged = merge(&global, &method);
//! assert_eq!(merged["csrf"], false);
//! assert_eq!(merged["option1"], "b");
//! ```

use crate::error::{MicronError, MicronResult};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};

/// A flattened configuration map: option name to arbitrary JSON value.
pub type Config = Map<String, Value>;

fn identifier_format() -> &'static Regex {
    static FORMAT: OnceLock<Regex> = OnceLock::new();
    FORMAT.get_or_init(|| Regex::new("^[a-zA-Z_][a-zA-Z0-9_]*$").expect("valid regex"))
}

/// Merges two configuration levels.
///
/// Entries in `overrides` take precedence over entries in `global` for
/// identical keys. Keys present on one side only pass through unchanged.
#[must_use]
pub fn merge(global: &Config, overrides: &Config) -> Config {
    let mut merged = global.clone();
    for (name, value) in overrides {
        merged.insert(name.clone(), value.clone());
    }
    merged
}

/// Checks that a configuration option name is a valid identifier.
pub fn validate_option_name(name: &str) -> MicronResult<()> {
    if identifier_format().is_match(name) {
        Ok(())
    } else {
        Err(MicronError::implementation(format!(
            "Invalid configuration option name '{name}' used (only letters, numbers \
             and underscores are allowed and the name must not start with a number)"
        )))
    }
}

/// One level of method configuration, optionally linked to a parent level.
#[derive(Debug, Clone, Default)]
pub struct MethodConfig {
    parent: Option<Arc<MethodConfig>>,
    data: Config,
}

impl MethodConfig {
    /// Creates an empty root configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty configuration level below `parent`.
    #[must_use]
    pub fn with_parent(parent: Arc<MethodConfig>) -> Self {
        Self {
            parent: Some(parent),
            data: Config::new(),
        }
    }

    /// Sets a single option.
    pub fn set(&mut self, name: &str, value: Value) -> MicronResult<()> {
        validate_option_name(name)?;
        self.data.insert(name.to_string(), value);
        Ok(())
    }

    /// Sets all options from `options`, validating every name first.
    pub fn configure(&mut self, options: &Config) -> MicronResult<&mut Self> {
        for name in options.keys() {
            validate_option_name(name)?;
        }
        for (name, value) in options {
            self.data.insert(name.clone(), value.clone());
        }
        Ok(self)
    }

    /// Looks up an option on this level, then on its ancestors.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.data.get(name) {
            Some(value) => Some(value),
            None => self.parent.as_ref().and_then(|parent| parent.get(name)),
        }
    }

    /// Returns the options set on this level only.
    #[must_use]
    pub fn local(&self) -> &Config {
        &self.data
    }

    /// Returns every option name in use across the hierarchy.
    #[must_use]
    pub fn option_names(&self) -> Vec<String> {
        self.flattened().keys().cloned().collect()
    }

    /// Flattens the hierarchy into a single map; nearer levels win.
    #[must_use]
    pub fn flattened(&self) -> Config {
        match &self.parent {
            Some(parent) => merge(&parent.flattened(), &self.data),
            None => self.data.clone(),
        }
    }
}

/// Typed accessors for option values.
pub trait ConfigExt {
    /// Reads an option as a flag.
    ///
    /// A missing option yields `default`. Present values follow JSON
    /// truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are false.
    fn flag(&self, name: &str, default: bool) -> bool;

    /// Reads an option as a string. Non-string values yield `None`.
    fn string(&self, name: &str) -> Option<&str>;
}

impl ConfigExt for Config {
    fn flag(&self, name: &str, default: bool) -> bool {
        self.get(name).map_or(default, truthy)
    }

    fn string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
