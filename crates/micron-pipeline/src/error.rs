//! Fatal pipeline failures.

use crate::hook::Hook;
use micron_core::MicronError;
use thiserror::Error;

/// A failure the executor cannot turn into a response.
///
/// Errors raised by the regular hooks are classified and rendered into
/// the response. The failures below happen after that safety net and are
/// handed to the host instead, which answers with a generic failure.
#[derive(Debug, Error)]
pub enum PipelineFailure {
    /// A hook raised while an earlier error was being handled:
    /// `create_response` or `process_error` on the error path, or
    /// `process_response` after an error response was built.
    #[error("{hook} hook failed while handling an error: {error}")]
    ErrorHandling {
        /// The hook that raised.
        hook: Hook,
        /// The error it raised.
        error: MicronError,
        /// The error that was being handled.
        original: Option<MicronError>,
    },

    /// An `end_request` hook raised.
    #[error("end_request hook failed: {error}")]
    EndRequest {
        /// The error it raised.
        error: MicronError,
    },

    /// The pipeline finished without a response.
    #[error("no response was produced for the request")]
    MissingResponse,
}

impl PipelineFailure {
    /// The hook whose failure made the request fail, if any.
    #[must_use]
    pub fn hook(&self) -> Option<Hook> {
        match self {
            Self::ErrorHandling { hook, .. } => Some(*hook),
            Self::EndRequest { .. } => Some(Hook::EndRequest),
            Self::MissingResponse => None,
        }
    }

    /// The error raised by the failing hook, if any.
    #[must_use]
    pub fn error(&self) -> Option<&MicronError> {
        match self {
            Self::ErrorHandling { error, .. } | Self::EndRequest { error } => Some(error),
            Self::MissingResponse => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let failure = PipelineFailure::ErrorHandling {
            hook: Hook::ProcessError,
            error: MicronError::server("Boom", "It broke."),
            original: Some(MicronError::access_denied()),
        };
        assert_eq!(
            failure.to_string(),
            "process_error hook failed while handling an error: Boom: It broke."
        );
        assert_eq!(failure.hook(), Some(Hook::ProcessError));
        assert_eq!(failure.error().map(MicronError::code), Some("Boom"));

        let failure = PipelineFailure::MissingResponse;
        assert!(failure.hook().is_none());
        assert!(failure.error().is_none());
    }
}
