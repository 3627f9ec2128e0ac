//! Tool handlers.

pub mod callback;
pub mod conversation;
pub mod files;
pub mod memory;
pub mod retrieve;
pub mod session;
pub mod user_init;

use std::sync::Arc;

use recall_core::instruction::LocalInstruction;
use serde_json::Value;
use tracing::debug;

use crate::rpc::errors::RpcError;
use crate::state::ServerState;

/// Fetch a required string argument.
pub fn require_string(args: Option<&Value>, key: &str) -> Result<String, RpcError> {
    optional_string(args, key)
        .ok_or_else(|| RpcError::invalid_params(format!("Missing required parameter: {key}")))
}

/// Fetch an optional string argument; empty strings count as absent.
#[must_use]
pub fn optional_string(args: Option<&Value>, key: &str) -> Option<String> {
    args.and_then(|a| a.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

/// Fetch an optional unsigned argument.
#[must_use]
pub fn optional_u64(args: Option<&Value>, key: &str) -> Option<u64> {
    args.and_then(|a| a.get(key)).and_then(Value::as_u64)
}

/// Push an instruction best-effort and await its ack off the request path.
///
/// Tool responses never wait on the client: the ack (or its 30 s expiry)
/// is observed by a spawned task, as dispatch and push are independent.
pub fn push_instruction(
    state: &ServerState,
    session_id: &str,
    user_id: &str,
    instruction: LocalInstruction,
) {
    let callback_id = instruction.callback_id.clone();
    match state.push.push_to_session(session_id, user_id, &instruction) {
        Some(rx) => {
            let push = Arc::clone(&state.push);
            drop(tokio::spawn(async move {
                let _ = push.await_ack(&callback_id, rx).await;
            }));
        }
        None => {
            debug!(session_id, callback_id, "instruction not delivered (no online client)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn require_string_rejects_missing_and_empty() {
        let args = json!({"present": "x", "blank": "  "});
        assert_eq!(require_string(Some(&args), "present").unwrap(), "x");
        assert!(require_string(Some(&args), "blank").is_err());
        assert!(require_string(Some(&args), "absent").is_err());
        assert!(require_string(None, "anything").is_err());
    }

    #[test]
    fn optional_helpers() {
        let args = json!({"s": " padded ", "n": 42});
        assert_eq!(optional_string(Some(&args), "s").unwrap(), "padded");
        assert_eq!(optional_u64(Some(&args), "n"), Some(42));
        assert_eq!(optional_u64(Some(&args), "s"), None);
    }
}
