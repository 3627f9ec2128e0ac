//! `session_management`: resolve or create the session for a workspace.

use async_trait::async_trait;
use recall_context::prompts::project_analysis_prompt;
use recall_store::SessionResolver;
use serde_json::{Map, Value, json};
use tracing::instrument;

use crate::rpc::context::RequestContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{optional_string, require_string};
use crate::rpc::registry::ToolHandler;
use crate::state::ServerState;

/// Handles `session_management` (action `get_or_create`).
pub struct SessionManagementHandler;

#[async_trait]
impl ToolHandler for SessionManagementHandler {
    #[instrument(skip_all, fields(method = "session_management", trace_id = %ctx.trace_id))]
    async fn handle(
        &self,
        args: Option<Value>,
        state: &ServerState,
        ctx: &RequestContext,
    ) -> Result<Value, RpcError> {
        let args = args.as_ref();
        let action = optional_string(args, "action").unwrap_or_else(|| "get_or_create".into());
        if action != "get_or_create" {
            return Err(RpcError::invalid_params(format!(
                "unsupported action: {action}"
            )));
        }

        let user_id = optional_string(args, "userId")
            .or_else(|| optional_string(args, "userID"))
            .ok_or_else(|| RpcError::invalid_params("Missing required parameter: userId"))?;
        let workspace_root = require_string(args, "workspaceRoot")?;
        let session_id = optional_string(args, "sessionId");
        let metadata: Map<String, Value> = args
            .and_then(|a| a.get("metadata"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let resolver = SessionResolver::new(&state.sessions, state.settings.session.timeout);
        let resolved = resolver.resolve_session(
            &user_id,
            session_id.as_deref(),
            &workspace_root,
            metadata,
            "tool",
        )?;

        let mut response = json!({
            "sessionId": resolved.session.id,
            "isNewSession": resolved.is_new,
            "workspaceHash": resolved.session.workspace_hash,
        });
        if state.contexts.needs_project_analysis(&resolved.session.id) {
            response["analysisPrompt"] = json!(project_analysis_prompt(&workspace_root, &user_id));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testutil::test_state;
    use std::time::Duration;

    async fn call(state: &ServerState, args: Value) -> Result<Value, RpcError> {
        SessionManagementHandler
            .handle(
                Some(args),
                state,
                &RequestContext::new(Duration::from_secs(120)),
            )
            .await
    }

    #[tokio::test]
    async fn bootstrap_new_workspace() {
        let state = test_state();
        let out = call(
            &state,
            json!({"userId": "U", "workspaceRoot": "/p/app"}),
        )
        .await
        .unwrap();
        assert_eq!(out["isNewSession"], true);
        assert!(out["sessionId"].as_str().unwrap().starts_with("sess_"));
        assert_eq!(out["workspaceHash"].as_str().unwrap().len(), 16);
        // No unified context exists yet, so the analysis prompt rides along.
        assert!(out["analysisPrompt"].as_str().unwrap().contains("/p/app"));
    }

    #[tokio::test]
    async fn same_workspace_within_window_reuses_session() {
        let state = test_state();
        let first = call(&state, json!({"userId": "U", "workspaceRoot": "/p/app"}))
            .await
            .unwrap();
        let second = call(&state, json!({"userId": "U", "workspaceRoot": "/p/app"}))
            .await
            .unwrap();
        assert_eq!(second["isNewSession"], false);
        assert_eq!(first["sessionId"], second["sessionId"]);
    }

    #[tokio::test]
    async fn empty_workspace_root_is_invalid() {
        let state = test_state();
        let err = call(&state, json!({"userId": "U", "workspaceRoot": ""}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[tokio::test]
    async fn missing_user_is_invalid() {
        let state = test_state();
        let err = call(&state, json!({"workspaceRoot": "/p/app"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[tokio::test]
    async fn legacy_user_id_key_is_accepted() {
        let state = test_state();
        let out = call(&state, json!({"userID": "U", "workspaceRoot": "/p/app"}))
            .await
            .unwrap();
        assert_eq!(out["isNewSession"], true);
    }

    #[tokio::test]
    async fn unsupported_action_is_invalid() {
        let state = test_state();
        let err = call(
            &state,
            json!({"action": "destroy", "userId": "U", "workspaceRoot": "/p/app"}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[tokio::test]
    async fn analysis_prompt_omitted_once_project_exists() {
        let state = test_state();
        let out = call(&state, json!({"userId": "U", "workspaceRoot": "/p/app"}))
            .await
            .unwrap();
        let session_id = out["sessionId"].as_str().unwrap();
        state
            .contexts
            .bootstrap_project(
                session_id,
                "U",
                out["workspaceHash"].as_str().unwrap(),
                r#"{"project_name": "app", "description": "a thing"}"#,
            )
            .unwrap();

        let again = call(&state, json!({"userId": "U", "workspaceRoot": "/p/app"}))
            .await
            .unwrap();
        assert!(again.get("analysisPrompt").is_none());
    }

    #[tokio::test]
    async fn explicit_session_id_for_other_workspace_is_mismatched() {
        let state = test_state();
        let out = call(&state, json!({"userId": "U", "workspaceRoot": "/p/app"}))
            .await
            .unwrap();
        let session_id = out["sessionId"].as_str().unwrap();
        let err = call(
            &state,
            json!({"userId": "U", "workspaceRoot": "/p/other", "sessionId": session_id}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), -32000);
    }
}
