//! Layered settings loader.

use std::env;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::{ConfigError, MicronSettings};

/// Loads [`MicronSettings`] in layers, later layers overriding earlier ones:
///
/// 1. defaults or a preset
/// 2. a TOML or JSON file (sections absent from the file keep defaults)
/// 3. `.env` entries, exported into the process environment
/// 4. `PREFIX__SECTION__KEY` environment variables
///
/// # Example
///
/// ```no_run
/// use micron_config::ConfigLoader;
///
/// # fn main() -> Result<(), micron_config::ConfigError> {
/// let settings = ConfigLoader::new()
///     .with_optional_file("micron.toml")?
///     .with_dotenv()?
///     .with_env_prefix("MICRON")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    settings: MicronSettings,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Creates a loader starting from [`MicronSettings::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the development preset.
    ///
    /// ```
    /// use micron_config::ConfigLoader;
    ///
    /// let settings = ConfigLoader::new().with_development().load().unwrap();
    /// assert!(settings.debug);
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.settings = MicronSettings::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.settings = MicronSettings::production();
        self
    }

    /// Loads a settings file; the format follows the extension.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing or unreadable, has an unsupported
    /// extension, or does not parse (unknown keys included).
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        self.settings = parse(&content, format)?;
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads settings from a string in the given format (`toml` or `json`).
    ///
    /// ```
    /// use micron_config::ConfigLoader;
    ///
    /// let settings = ConfigLoader::new()
    ///     .with_string("debug = true\n[options]\ncsrf = false", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(settings.debug);
    /// assert_eq!(settings.options["csrf"], false);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.settings = parse(content, format)?;
        Ok(self)
    }

    /// Enables `PREFIX__SECTION__KEY` environment overrides.
    ///
    /// Recognized keys:
    ///
    /// | Variable | Setting |
    /// |----------|---------|
    /// | `MICRON__DEBUG` | `debug` |
    /// | `MICRON__SERVER__HTTP_ADDR` | `server.http_addr` |
    /// | `MICRON__SERVER__SESSION_COOKIE` | `server.session_cookie` |
    /// | `MICRON__LOGGING__ENABLED` | `logging.enabled` |
    /// | `MICRON__LOGGING__LEVEL` | `logging.level` |
    /// | `MICRON__LOGGING__JSON_FORMAT` | `logging.json_format` |
    /// | `MICRON__LOGGING__SERVICE_NAME` | `logging.service_name` |
    /// | `MICRON__OPTIONS__<NAME>` | `options.<name>` (lowercased) |
    ///
    /// Option values are parsed as JSON and fall back to a plain string.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Exports the entries of `./.env` into the process environment.
    ///
    /// A missing `.env` file is not an error.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Applies environment overrides and validates the result.
    ///
    /// # Errors
    ///
    /// Fails when an environment variable cannot be applied or the final
    /// settings are invalid (see [`MicronSettings::validate`]).
    pub fn load(mut self) -> Result<MicronSettings, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: Vec<(String, String)> = env::vars()
                .filter(|(key, _)| key.starts_with(&prefix))
                .collect();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }

        self.settings.validate()?;
        Ok(self.settings)
    }

    /// Returns the settings without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> MicronSettings {
        self.settings
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(path) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = path.split("__").collect();

        match parts.as_slice() {
            ["DEBUG"] => self.settings.debug = parse_bool_var(key, value)?,

            ["SERVER", "HTTP_ADDR"] => self.settings.server.http_addr = value.to_string(),
            ["SERVER", "SESSION_COOKIE"] => {
                self.settings.server.session_cookie = value.to_string();
            }

            ["LOGGING", "ENABLED"] => self.settings.logging.enabled = parse_bool_var(key, value)?,
            ["LOGGING", "LEVEL"] => self.settings.logging.level = value.to_string(),
            ["LOGGING", "JSON_FORMAT"] => {
                self.settings.logging.json_format = parse_bool_var(key, value)?;
            }
            ["LOGGING", "SERVICE_NAME"] => self.settings.logging.service_name = value.to_string(),

            ["OPTIONS", name] if !name.is_empty() => {
                self.settings
                    .options
                    .insert(name.to_lowercase(), parse_option_value(value));
            }

            // Unknown keys are left for other consumers of the prefix.
            _ => {}
        }
        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<MicronSettings, ConfigError> {
    match format.to_lowercase().as_str() {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_bool_var(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_option_value(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
}
