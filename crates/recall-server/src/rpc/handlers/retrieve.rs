//! `retrieve_context`: the canonical retrieve path.
//!
//! Optionally bootstraps the project context from a supplied analysis
//! payload, then runs intent analysis → wide recall → synthesis through
//! the unified context manager and returns the three-dimensional reply.

use async_trait::async_trait;
use recall_core::errors::RecallError;
use recall_core::workspace;
use recall_context::manager::ContextUpdateRequest;
use serde_json::{Value, json};
use tracing::instrument;

use crate::rpc::context::RequestContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{optional_string, require_string};
use crate::rpc::registry::ToolHandler;
use crate::state::ServerState;

/// Handles `retrieve_context`.
pub struct RetrieveContextHandler;

#[async_trait]
impl ToolHandler for RetrieveContextHandler {
    #[instrument(skip_all, fields(method = "retrieve_context", trace_id = %ctx.trace_id))]
    async fn handle(
        &self,
        args: Option<Value>,
        state: &ServerState,
        ctx: &RequestContext,
    ) -> Result<Value, RpcError> {
        let args = args.as_ref();
        let session_id = require_string(args, "sessionId")?;
        let query = require_string(args, "query")?;

        let session = state.sessions.get_session(&session_id)?;

        // A caller-supplied workspace must match the session's binding;
        // cross-workspace reuse is rejected regardless of user match.
        if let Some(workspace_root) = optional_string(args, "workspaceRoot") {
            let requested = workspace::workspace_hash(&workspace_root)?;
            if requested != session.workspace_hash {
                return Err(RecallError::MismatchedWorkspace {
                    expected: session.workspace_hash.clone(),
                    actual: requested,
                }
                .into());
            }
        }

        // Project bootstrap runs before retrieval so the synthesis prompt
        // has a valid project baseline.
        if let Some(analysis) = args.and_then(|a| a.get("projectAnalysis")) {
            let payload = match analysis {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let _ = state.contexts.bootstrap_project(
                &session.id,
                &session.user_id,
                &session.workspace_hash,
                &payload,
            )?;
        }

        let outcome = state
            .contexts
            .update_context(&ContextUpdateRequest {
                session_id: session.id.clone(),
                user_id: session.user_id.clone(),
                workspace_id: session.workspace_hash.clone(),
                query,
                deadline: Some(ctx.deadline),
            })
            .await;

        Ok(json!({
            "shortTermMemory": outcome.reply.short_term_memory,
            "longTermMemory": outcome.reply.long_term_memory,
            "relevantKnowledge": outcome.reply.relevant_knowledge,
            "confidenceLevel": outcome.confidence_level,
            "updateSummary": outcome.update_summary,
            "processingTimeMs": outcome.processing_time.as_millis() as u64,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testutil::test_state_with_vector;
    use recall_core::retrieval::VectorMatch;
    use std::time::Duration;

    fn ctx() -> RequestContext {
        RequestContext::new(Duration::from_secs(120))
    }

    const ANALYSIS: &str = r#"{"project_name": "app", "description": "demo", "primary_language": "rust"}"#;

    #[tokio::test]
    async fn retrieve_with_project_analysis_bootstraps_then_replies() {
        let (state, vector) = test_state_with_vector();
        vector.insert(VectorMatch {
            id: "v1".into(),
            content: Some("test query notes".into()),
            ..VectorMatch::default()
        });
        let (session, _) = state
            .sessions
            .get_or_create_active_session_with_workspace("U", "ws", Duration::from_secs(1800))
            .unwrap();

        let out = RetrieveContextHandler
            .handle(
                Some(json!({
                    "sessionId": session.id,
                    "query": "how does X work?",
                    "projectAnalysis": ANALYSIS,
                })),
                &state,
                &ctx(),
            )
            .await
            .unwrap();

        // Project populated from the analysis payload.
        let unified = state.contexts.get(&session.id).unwrap();
        assert_eq!(unified.project.as_ref().unwrap().project_name, "app");
        // Reply filled from the scripted user_response.
        assert_eq!(out["shortTermMemory"], "test intent");
        assert_eq!(out["longTermMemory"], "test solution");
        assert!(
            out["relevantKnowledge"]
                .as_str()
                .unwrap()
                .contains("🎯 意图分析")
        );
        assert!(out["processingTimeMs"].is_u64());
    }

    #[tokio::test]
    async fn project_analysis_accepts_object_payload() {
        let (state, _vector) = test_state_with_vector();
        let (session, _) = state
            .sessions
            .get_or_create_active_session_with_workspace("U", "ws", Duration::from_secs(1800))
            .unwrap();
        let analysis: Value = serde_json::from_str(ANALYSIS).unwrap();
        let _ = RetrieveContextHandler
            .handle(
                Some(json!({"sessionId": session.id, "query": "q", "projectAnalysis": analysis})),
                &state,
                &ctx(),
            )
            .await
            .unwrap();
        assert!(!state.contexts.needs_project_analysis(&session.id));
    }

    #[tokio::test]
    async fn workspace_mismatch_is_rejected() {
        let (state, _vector) = test_state_with_vector();
        let (session, _) = state
            .sessions
            .get_or_create_active_session_with_workspace(
                "U",
                &recall_core::workspace::workspace_hash("/p/app").unwrap(),
                Duration::from_secs(1800),
            )
            .unwrap();
        let err = RetrieveContextHandler
            .handle(
                Some(json!({
                    "sessionId": session.id,
                    "query": "q",
                    "workspaceRoot": "/p/other",
                })),
                &state,
                &ctx(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32000);
        assert!(err.to_string().contains("workspace"));
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (state, _vector) = test_state_with_vector();
        let err = RetrieveContextHandler
            .handle(
                Some(json!({"sessionId": "sess_ghost", "query": "q"})),
                &state,
                &ctx(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32000);
    }

    #[tokio::test]
    async fn empty_backends_still_reply_via_project_fallback() {
        let (state, _vector) = test_state_with_vector();
        let (session, _) = state
            .sessions
            .get_or_create_active_session_with_workspace("U", "ws", Duration::from_secs(1800))
            .unwrap();
        let out = RetrieveContextHandler
            .handle(
                Some(json!({"sessionId": session.id, "query": "q"})),
                &state,
                &ctx(),
            )
            .await
            .unwrap();
        // Scripted project-only flow answers with the baseline text.
        assert!(out["longTermMemory"].as_str().unwrap().contains("baseline"));
        assert_eq!(out["updateSummary"], "no update applied");
    }

    #[tokio::test]
    async fn malformed_project_analysis_is_surfaced() {
        let (state, _vector) = test_state_with_vector();
        let (session, _) = state
            .sessions
            .get_or_create_active_session_with_workspace("U", "ws", Duration::from_secs(1800))
            .unwrap();
        let err = RetrieveContextHandler
            .handle(
                Some(json!({"sessionId": session.id, "query": "q", "projectAnalysis": "not json"})),
                &state,
                &ctx(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32000);
    }
}
