//! Input normalization plugin.
//!
//! Rewrites the input value recursively, through objects and arrays:
//!
//! - leading and trailing whitespace is stripped from strings;
//! - strings that end up empty become `null`.
//!
//! Object keys are never altered. Three options control the behavior, all
//! defaulting to `true`:
//!
//! | Option | Effect |
//! |---|---|
//! | `normalize` | master switch |
//! | `strip_strings` | strip whitespace from strings |
//! | `make_empty_strings_none` | turn empty strings into `null` |

use crate::context::PluginContext;
use crate::hook::{Hook, HookSet};
use crate::plugin::Plugin;
use micron_core::{ConfigExt, MicronResult};
use serde_json::Value;

/// Master switch option.
pub const NORMALIZE: &str = "normalize";
/// Whitespace stripping option.
pub const STRIP_STRINGS: &str = "strip_strings";
/// Empty string to `null` option.
pub const MAKE_EMPTY_STRINGS_NONE: &str = "make_empty_strings_none";

/// The input normalization plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeInputPlugin;

impl NormalizeInputPlugin {
    /// Creates the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for NormalizeInputPlugin {
    fn name(&self) -> &'static str {
        "normalize_input"
    }

    fn hooks(&self) -> HookSet {
        HookSet::EMPTY.with(Hook::NormalizeInput)
    }

    fn normalize_input(&self, ctx: &mut PluginContext) -> MicronResult<()> {
        let config = ctx.config();
        if !config.flag(NORMALIZE, true) {
            return Ok(());
        }
        let rules = Rules {
            strip_strings: config.flag(STRIP_STRINGS, true),
            make_empty_none: config.flag(MAKE_EMPTY_STRINGS_NONE, true),
        };
        if rules.strip_strings || rules.make_empty_none {
            let input = ctx.take_input();
            ctx.set_input(normalize(input, rules));
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
struct Rules {
    strip_strings: bool,
    make_empty_none: bool,
}

fn normalize(value: Value, rules: Rules) -> Value {
    match value {
        Value::String(text) => {
            let text = if rules.strip_strings && text.trim().len() != text.len() {
                text.trim().to_string()
            } else {
                text
            };
            if rules.make_empty_none && text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            }
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| normalize(item, rules))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, normalize(item, rules)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use micron_core::{Function, MicronRequest};
    use serde_json::json;

    fn normalized(input: Value, options: Value) -> Value {
        let mut ctx = PluginContext::new(
            Function::unary("f", |value: Value| Ok(value)),
            options.as_object().cloned().unwrap_or_default(),
            MicronRequest::new(Method::POST, "/f"),
        );
        ctx.set_input(input);
        NormalizeInputPlugin.normalize_input(&mut ctx).unwrap();
        ctx.take_input()
    }

    #[test]
    fn test_strips_strings() {
        assert_eq!(normalized(json!("  Jacky\t\n "), json!({})), json!("Jacky"));
    }

    #[test]
    fn test_whitespace_only_becomes_null() {
        assert_eq!(normalized(json!("   "), json!({})), Value::Null);
        assert_eq!(normalized(json!(""), json!({})), Value::Null);
    }

    #[test]
    fn test_recurses_into_containers() {
        let input = json!({
            " key ": " value ",
            "list": ["  a", "", {"deep": " b "}],
            "number": 42,
            "flag": true,
            "nothing": null,
        });
        assert_eq!(
            normalized(input, json!({})),
            json!({
                " key ": "value",
                "list": ["a", null, {"deep": "b"}],
                "number": 42,
                "flag": true,
                "nothing": null,
            })
        );
    }

    #[test]
    fn test_normalize_disabled() {
        let input = json!({"name": "  padded  ", "empty": ""});
        assert_eq!(normalized(input.clone(), json!({"normalize": false})), input);
    }

    #[test]
    fn test_strip_only() {
        assert_eq!(
            normalized(
                json!([" a ", "  "]),
                json!({"make_empty_strings_none": false})
            ),
            json!(["a", ""])
        );
    }

    #[test]
    fn test_empty_to_null_only() {
        assert_eq!(
            normalized(json!([" a ", "", "  "]), json!({"strip_strings": false})),
            json!([" a ", null, "  "])
        );
    }

    #[test]
    fn test_everything_disabled() {
        let options = json!({"strip_strings": false, "make_empty_strings_none": false});
        assert_eq!(normalized(json!(" x "), options), json!(" x "));
    }
}
