//! RPC error codes and their mapping from the core hierarchy.

use recall_core::errors::RecallError;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors surfaced at the envelope boundary.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Body was not valid JSON.
    #[error("parse error")]
    ParseError,
    /// Envelope shape was wrong.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Unknown method or tool name.
    #[error("method not found: {0}")]
    MethodNotFound(String),
    /// Tool arguments failed validation.
    #[error("invalid params: {message}")]
    InvalidParams {
        /// What was wrong.
        message: String,
    },
    /// Unexpected server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
    /// A core application error (workspace mismatch, store failures, …).
    #[error(transparent)]
    App(#[from] RecallError),
}

impl RpcError {
    /// JSON-RPC error code.
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest(_) => -32600,
            Self::MethodNotFound(_) => -32601,
            Self::InvalidParams { .. } => -32602,
            Self::Internal(_) => -32603,
            Self::App(e) => match e {
                RecallError::InvalidArgument(_) => -32602,
                RecallError::Internal(_) => -32603,
                _ => -32000,
            },
        }
    }

    /// Render as the envelope's `error` object.
    #[must_use]
    pub fn to_error_object(&self) -> Value {
        json!({
            "code": self.code(),
            "message": self.to_string(),
        })
    }

    /// Convenience constructor for missing/invalid arguments.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_mapping_matches_contract() {
        assert_eq!(RpcError::ParseError.code(), -32700);
        assert_eq!(RpcError::InvalidRequest("x".into()).code(), -32600);
        assert_eq!(RpcError::MethodNotFound("x".into()).code(), -32601);
        assert_eq!(RpcError::invalid_params("x").code(), -32602);
        assert_eq!(RpcError::Internal("x".into()).code(), -32603);
    }

    #[test]
    fn app_errors_map_by_kind() {
        assert_eq!(
            RpcError::App(RecallError::InvalidArgument("x".into())).code(),
            -32602
        );
        assert_eq!(RpcError::App(RecallError::MissingWorkspace).code(), -32000);
        assert_eq!(
            RpcError::App(RecallError::MismatchedWorkspace {
                expected: "a".into(),
                actual: "b".into()
            })
            .code(),
            -32000
        );
        assert_eq!(
            RpcError::App(RecallError::Internal("x".into())).code(),
            -32603
        );
    }

    #[test]
    fn error_object_shape() {
        let obj = RpcError::MethodNotFound("mystery_tool".into()).to_error_object();
        assert_eq!(obj["code"], -32601);
        assert!(obj["message"].as_str().unwrap().contains("mystery_tool"));
    }
}
