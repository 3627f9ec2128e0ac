//! Error hierarchy for the recall service.
//!
//! One enum covers the whole pipeline so errors can cross crate seams
//! without re-wrapping. The server maps each variant to a JSON-RPC error
//! code at the envelope boundary.

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, RecallError>;

/// All error kinds produced by the core pipeline.
#[derive(Debug, Error)]
pub enum RecallError {
    /// A request argument failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The request required a workspace path and none was supplied.
    #[error("workspace path is required")]
    MissingWorkspace,

    /// A session id was used against a different workspace than it was
    /// created in. Cross-workspace reuse is never allowed.
    #[error("session is bound to workspace {expected}, request targets {actual}")]
    MismatchedWorkspace {
        /// Hash stored on the session.
        expected: String,
        /// Hash derived from the request's workspace path.
        actual: String,
    },

    /// No session with the given id exists.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The user has not completed the init dialog yet.
    #[error("user not initialized")]
    UserNotInitialized,

    /// An init attempt collided with an existing user record.
    #[error("user already exists: {0}")]
    UserAlreadyExists(String),

    /// The completion service did not answer within its deadline.
    #[error("llm call timed out after {0:?}")]
    LlmTimeout(std::time::Duration),

    /// The completion service failed at the transport or HTTP layer.
    #[error("llm transient failure: {0}")]
    LlmTransient(String),

    /// The completion service answered, but the payload could not be used.
    #[error("llm returned malformed output: {0}")]
    LlmMalformed(String),

    /// One retrieval dimension failed entirely.
    #[error("retrieval dimension {dimension} failed: {message}")]
    RetrievalDimensionFailed {
        /// Dimension name (`timeline`, `knowledge`, `vector`).
        dimension: &'static str,
        /// Underlying failure description.
        message: String,
    },

    /// A backing store rejected a read or write.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// No push route to the client was available.
    #[error("push channel unavailable: {0}")]
    PushUnavailable(String),

    /// Anything that should never happen.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RecallError {
    /// Stable machine-readable kind tag, used in logs and envelopes.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::MissingWorkspace => "missing_workspace",
            Self::MismatchedWorkspace { .. } => "mismatched_workspace",
            Self::SessionNotFound(_) => "session_not_found",
            Self::UserNotInitialized => "user_not_initialized",
            Self::UserAlreadyExists(_) => "user_already_exists",
            Self::LlmTimeout(_) => "llm_timeout",
            Self::LlmTransient(_) => "llm_transient",
            Self::LlmMalformed(_) => "llm_malformed",
            Self::RetrievalDimensionFailed { .. } => "retrieval_dimension_failed",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::PushUnavailable(_) => "push_unavailable",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether the error is a caller mistake (vs. a service-side failure).
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::MissingWorkspace
                | Self::MismatchedWorkspace { .. }
                | Self::SessionNotFound(_)
                | Self::UserAlreadyExists(_)
        )
    }
}

impl From<std::io::Error> for RecallError {
    fn from(e: std::io::Error) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for RecallError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failure: {e}"))
    }
}
