//! Business-function wrapper.
//!
//! A Micron method wraps exactly one business function. The function takes
//! zero or one argument, and the single argument may have a default value.
//! [`Function`] erases the concrete Rust signature into a call that takes
//! the optional JSON input and returns JSON output, while remembering the
//! declared [`Signature`] so the pipeline can enforce the arity contract.
//!
//! ```
//! use micron_core::{Function, MicronResult};
//! use serde_json::json;
//!
//! fn hello(name: String) -> MicronResult<String> {
//!     Ok(format!("Hello, {name}!"))
//! }
//!
//! let function = Function::with_default("hello", "World".to_string(), hello);
//! assert!(function.signature().has_default());
//! assert_eq!(function.call(None).unwrap(), json!("Hello, World!"));
//! assert_eq!(function.call(Some(json!("Jacky"))).unwrap(), json!("Hello, Jacky!"));
//! ```

use crate::error::{codes, MicronError, MicronResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The declared shape of a business function's parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    arguments: usize,
    has_default: bool,
}

impl Signature {
    /// A function that takes no arguments.
    pub const NULLARY: Self = Self {
        arguments: 0,
        has_default: false,
    };

    /// A function that takes one required argument.
    pub const UNARY: Self = Self {
        arguments: 1,
        has_default: false,
    };

    /// A function that takes one argument with a default value.
    pub const UNARY_WITH_DEFAULT: Self = Self {
        arguments: 1,
        has_default: true,
    };

    /// Describes an arbitrary parameter list. Use [`Signature::validate`]
    /// to check that Micron can call it.
    #[must_use]
    pub const fn new(arguments: usize, has_default: bool) -> Self {
        Self {
            arguments,
            has_default,
        }
    }

    /// Number of declared arguments.
    #[must_use]
    pub const fn arguments(&self) -> usize {
        self.arguments
    }

    /// Whether the function accepts an input argument at all.
    #[must_use]
    pub const fn wants_input(&self) -> bool {
        self.arguments == 1
    }

    /// Whether the argument may be omitted.
    #[must_use]
    pub const fn has_default(&self) -> bool {
        self.has_default
    }

    /// Checks that a function with this signature can be a Micron method.
    pub fn validate(&self, function_name: &str) -> MicronResult<()> {
        if self.arguments > 1 {
            return Err(MicronError::implementation(format!(
                "The function {function_name}() must accept at most one argument, \
                 but it declares {} arguments",
                self.arguments
            )));
        }
        if self.has_default && self.arguments == 0 {
            return Err(MicronError::implementation(format!(
                "The function {function_name}() declares a default value \
                 without declaring an argument"
            )));
        }
        Ok(())
    }
}

type Call = dyn Fn(Option<Value>) -> MicronResult<Value> + Send + Sync;

/// A type-erased business function.
///
/// Cloning is cheap: the callable is shared.
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    signature: Signature,
    call: Arc<Call>,
}

impl Function {
    /// Wraps a function that takes no arguments.
    pub fn nullary<F, R>(name: impl Into<Arc<str>>, function: F) -> Self
    where
        F: Fn() -> MicronResult<R> + Send + Sync + 'static,
        R: Serialize,
    {
        Self::raw(name, Signature::NULLARY, move |_| to_output(function()?))
    }

    /// Wraps a function that takes one required argument.
    ///
    /// The input is deserialized into `T`; a mismatch is reported to the
    /// client as `InvalidInput`.
    pub fn unary<F, T, R>(name: impl Into<Arc<str>>, function: F) -> Self
    where
        F: Fn(T) -> MicronResult<R> + Send + Sync + 'static,
        T: DeserializeOwned,
        R: Serialize,
    {
        let name = name.into();
        let function_name = Arc::clone(&name);
        Self::raw(name, Signature::UNARY, move |input| match input {
            Some(input) => to_output(function(from_input(input)?)?),
            None => Err(MicronError::implementation(format!(
                "The function {function_name}() requires an argument but was called without one"
            ))),
        })
    }

    /// Wraps a function whose single argument falls back to `default`
    /// when no input is given.
    pub fn with_default<F, T, R>(name: impl Into<Arc<str>>, default: T, function: F) -> Self
    where
        F: Fn(T) -> MicronResult<R> + Send + Sync + 'static,
        T: DeserializeOwned + Clone + Send + Sync + 'static,
        R: Serialize,
    {
        Self::raw(name, Signature::UNARY_WITH_DEFAULT, move |input| {
            let argument = match input {
                Some(input) => from_input(input)?,
                None => default.clone(),
            };
            to_output(function(argument)?)
        })
    }

    /// Wraps a callable working on raw JSON with an explicit signature.
    ///
    /// The signature is not validated here; registration does that.
    pub fn raw<F>(name: impl Into<Arc<str>>, signature: Signature, call: F) -> Self
    where
        F: Fn(Option<Value>) -> MicronResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            call: Arc::new(call),
        }
    }

    /// The function name, used for the default route rule.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared signature.
    #[must_use]
    pub const fn signature(&self) -> Signature {
        self.signature
    }

    /// Invokes the function. `None` means "call without an argument".
    pub fn call(&self, input: Option<Value>) -> MicronResult<Value> {
        (self.call)(input)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

fn from_input<T: DeserializeOwned>(input: Value) -> MicronResult<T> {
    serde_json::from_value(input).map_err(|error| {
        MicronError::client(
            codes::INVALID_INPUT,
            "The input data could not be converted into the argument of the requested method.",
        )
        .with_details(Value::String(error.to_string()))
    })
}

fn to_output<R: Serialize>(output: R) -> MicronResult<Value> {
    serde_json::to_value(output).map_err(|error| {
        MicronError::implementation(format!("Unsupported type in response data: {error}"))
    })
}
