//! Hook identifiers and capability sets.
//!
//! A [`Hook`] names one extension point of the request pipeline. Each
//! plugin declares the hooks it implements once, as a [`HookSet`], and the
//! plugin container records that set at registration time.

use std::fmt;

/// A named extension point in the request pipeline.
///
/// The discriminants give the order in which hooks are declared; the
/// executor drives them in the order documented on [`crate::Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Hook {
    /// Determine the request methods an endpoint accepts (exclusive).
    RequestMethods = 0,
    /// Plugin initialization for a request.
    StartRequest = 1,
    /// Access control; any implementation may deny the request.
    CheckAccess = 2,
    /// Bookkeeping after access was granted.
    AfterCheckAccess = 3,
    /// Produce the input value from the raw request (exclusive).
    ReadInput = 4,
    /// Transform the input value.
    NormalizeInput = 5,
    /// Read-only checks on the input value.
    ValidateInput = 6,
    /// Invoke the business function (exclusive).
    CallFunction = 7,
    /// Transform the output value.
    ProcessOutput = 8,
    /// Build the response from the output value (exclusive).
    CreateResponse = 9,
    /// Adjust the response after an error was recorded.
    ProcessError = 10,
    /// Final adjustments to the response.
    ProcessResponse = 11,
    /// Teardown; runs exactly once per request.
    EndRequest = 12,
}

impl Hook {
    /// Number of hooks.
    pub const COUNT: usize = 13;

    /// Returns the hook name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RequestMethods => "request_methods",
            Self::StartRequest => "start_request",
            Self::CheckAccess => "check_access",
            Self::AfterCheckAccess => "after_check_access",
            Self::ReadInput => "read_input",
            Self::NormalizeInput => "normalize_input",
            Self::ValidateInput => "validate_input",
            Self::CallFunction => "call_function",
            Self::ProcessOutput => "process_output",
            Self::CreateResponse => "create_response",
            Self::ProcessError => "process_error",
            Self::ProcessResponse => "process_response",
            Self::EndRequest => "end_request",
        }
    }

    /// Returns true if only the last registered implementation runs.
    #[must_use]
    pub const fn is_exclusive(self) -> bool {
        matches!(
            self,
            Self::RequestMethods | Self::ReadInput | Self::CallFunction | Self::CreateResponse
        )
    }

    /// Returns true if every implementation runs, in registration order.
    #[must_use]
    pub const fn is_additive(self) -> bool {
        !self.is_exclusive()
    }

    /// Returns all hooks in declaration order.
    #[must_use]
    pub const fn all() -> [Hook; Self::COUNT] {
        [
            Self::RequestMethods,
            Self::StartRequest,
            Self::CheckAccess,
            Self::AfterCheckAccess,
            Self::ReadInput,
            Self::NormalizeInput,
            Self::ValidateInput,
            Self::CallFunction,
            Self::ProcessOutput,
            Self::CreateResponse,
            Self::ProcessError,
            Self::ProcessResponse,
            Self::EndRequest,
        ]
    }

    /// Looks up a hook by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Hook> {
        Self::all().into_iter().find(|hook| hook.name() == name)
    }

    const fn bit(self) -> u16 {
        1u16 << (self as u16)
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of hooks a plugin implements.
///
/// ```
/// use micron_pipeline::{Hook, HookSet};
///
/// const HOOKS: HookSet = HookSet::EMPTY
///     .with(Hook::CheckAccess)
///     .with(Hook::ProcessResponse);
///
/// assert!(HOOKS.contains(Hook::CheckAccess));
/// assert!(!HOOKS.contains(Hook::ReadInput));
/// assert_eq!(HOOKS.len(), 2);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HookSet(u16);

impl HookSet {
    /// The empty set.
    pub const EMPTY: HookSet = HookSet(0);

    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Returns the set of every hook.
    #[must_use]
    pub const fn all() -> Self {
        Self((1u16 << Hook::COUNT as u16) - 1)
    }

    /// Returns a copy of the set including `hook`.
    #[must_use]
    pub const fn with(self, hook: Hook) -> Self {
        Self(self.0 | hook.bit())
    }

    /// Adds `hook` to the set.
    pub fn insert(&mut self, hook: Hook) {
        self.0 |= hook.bit();
    }

    /// Checks whether `hook` is in the set.
    #[must_use]
    pub const fn contains(self, hook: Hook) -> bool {
        self.0 & hook.bit() != 0
    }

    /// Number of hooks in the set.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Returns true for the empty set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the hooks in the set, in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Hook> {
        Hook::all().into_iter().filter(move |hook| self.contains(*hook))
    }
}

impl FromIterator<Hook> for HookSet {
    fn from_iter<I: IntoIterator<Item = Hook>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for hook in iter {
            set.insert(hook);
        }
        set
    }
}

impl fmt::Debug for HookSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Hook::name)).finish()
    }
}
