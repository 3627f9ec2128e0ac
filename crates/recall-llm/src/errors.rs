//! Provider errors and their mapping into the core hierarchy.

use std::time::Duration;

use recall_core::errors::RecallError;
use thiserror::Error;

/// Result alias for completion calls.
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Errors a completion provider can raise.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The call did not finish within its deadline.
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    /// The transport or HTTP layer failed; retryable.
    #[error("transient completion failure: {message}")]
    Transient {
        /// HTTP status, when one was received.
        status: Option<u16>,
        /// Failure description.
        message: String,
    },

    /// Credentials were rejected or could not be encoded.
    #[error("completion auth failure: {0}")]
    Auth(String),

    /// The provider answered 2xx but the body was not a recognizable
    /// completion envelope (missing choices/content).
    #[error("unusable completion response: {0}")]
    InvalidResponse(String),
}

impl From<LlmError> for RecallError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Timeout(d) => Self::LlmTimeout(d),
            LlmError::Transient { .. } | LlmError::Auth(_) => Self::LlmTransient(e.to_string()),
            LlmError::InvalidResponse(msg) => Self::LlmMalformed(msg),
        }
    }
}
