//! Test error types.

use micron::PipelineFailure;
use thiserror::Error;

/// Errors that can occur while calling methods in tests.
#[derive(Debug, Error)]
pub enum TestError {
    /// No method is registered under the rule.
    #[error("no method registered at '{0}'")]
    UnknownRule(String),

    /// The pipeline failed without producing a response.
    #[error("pipeline failure: {0}")]
    Pipeline(#[from] PipelineFailure),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response body is not valid UTF-8.
    #[error("body read error: {0}")]
    BodyRead(String),

    /// A header name or value is invalid.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The bootstrap call returned no CSRF token.
    #[error("no CSRF token issued by '{0}'")]
    MissingCsrfToken(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            TestError::UnknownRule("/nope".to_string()).to_string(),
            "no method registered at '/nope'"
        );
        assert_eq!(
            TestError::from(PipelineFailure::MissingResponse).to_string(),
            format!("pipeline failure: {}", PipelineFailure::MissingResponse)
        );
    }
}
