//! `user_init_dialog`: drive the initialization state machine.

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use crate::rpc::context::RequestContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{optional_string, require_string};
use crate::rpc::registry::ToolHandler;
use crate::state::ServerState;

/// Handles `user_init_dialog`.
pub struct UserInitDialogHandler;

#[async_trait]
impl ToolHandler for UserInitDialogHandler {
    #[instrument(skip_all, fields(method = "user_init_dialog", trace_id = %ctx.trace_id))]
    async fn handle(
        &self,
        args: Option<Value>,
        state: &ServerState,
        ctx: &RequestContext,
    ) -> Result<Value, RpcError> {
        let args = args.as_ref();
        let session_id = require_string(args, "sessionId")?;
        let response = optional_string(args, "userResponse");
        Ok(state
            .init_dialogs
            .advance(&session_id, response.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testutil::test_state;
    use serde_json::json;
    use std::time::Duration;

    fn ctx() -> RequestContext {
        RequestContext::new(Duration::from_secs(120))
    }

    #[tokio::test]
    async fn full_new_user_flow_through_the_tool() {
        let state = test_state();
        let opening = UserInitDialogHandler
            .handle(Some(json!({"sessionId": "sess_a"})), &state, &ctx())
            .await
            .unwrap();
        assert_eq!(opening["stage"], "asking");

        let done = UserInitDialogHandler
            .handle(
                Some(json!({"sessionId": "sess_a", "userResponse": "new user please"})),
                &state,
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(done["stage"], "completed");
        let user_id = done["userId"].as_str().unwrap();
        assert!(state.users.is_initialized(user_id));
    }

    #[tokio::test]
    async fn missing_session_id_is_invalid() {
        let state = test_state();
        let err = UserInitDialogHandler
            .handle(Some(json!({})), &state, &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);
    }
}
