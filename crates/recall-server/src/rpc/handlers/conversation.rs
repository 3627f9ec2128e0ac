//! `store_conversation`: persist messages and summarize them.
//!
//! The summary comes from one completion call; a failing call degrades to
//! a truncated extract of the first message instead of failing the store.
//! A `short_memory` instruction mirrors the summary to the client.

use async_trait::async_trait;
use chrono::Utc;
use recall_core::instruction::{InstructionOptions, InstructionType, LocalInstruction};
use recall_core::session::ConversationMessage;
use recall_core::text::truncate_with_suffix;
use recall_llm::{CompletionClient as _, CompletionRequest};
use serde_json::{Value, json};
use tracing::{instrument, warn};

use crate::rpc::context::RequestContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{optional_string, push_instruction, require_string};
use crate::rpc::registry::ToolHandler;
use crate::state::ServerState;

/// Summary budget when the completion call degrades.
const FALLBACK_SUMMARY_BYTES: usize = 120;

fn parse_messages(args: Option<&Value>) -> Result<Vec<ConversationMessage>, RpcError> {
    let raw = args
        .and_then(|a| a.get("messages"))
        .and_then(Value::as_array)
        .ok_or_else(|| RpcError::invalid_params("Missing required parameter: messages"))?;
    if raw.is_empty() {
        return Err(RpcError::invalid_params("messages must not be empty"));
    }
    raw.iter()
        .map(|m| {
            let role = m
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or("user")
                .to_owned();
            let content = m
                .get("content")
                .and_then(Value::as_str)
                .ok_or_else(|| RpcError::invalid_params("message content must be a string"))?
                .to_owned();
            Ok(ConversationMessage {
                role,
                content,
                timestamp: Some(Utc::now()),
            })
        })
        .collect()
}

/// Handles `store_conversation`.
pub struct StoreConversationHandler;

impl StoreConversationHandler {
    async fn summarize(state: &ServerState, messages: &[ConversationMessage]) -> String {
        let transcript: String = messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Summarize this coding conversation in one sentence, keeping file names and decisions:\n\n{transcript}"
        );
        let request = CompletionRequest::new(prompt)
            .with_timeout(state.settings.timeouts.llm);
        match state.llm.complete(request).await {
            Ok(completion) => completion.content.trim().to_owned(),
            Err(e) => {
                warn!(error = %e, "conversation summary call failed, using extract");
                truncate_with_suffix(&messages[0].content, FALLBACK_SUMMARY_BYTES, "…")
            }
        }
    }
}

#[async_trait]
impl ToolHandler for StoreConversationHandler {
    #[instrument(skip_all, fields(method = "store_conversation", trace_id = %ctx.trace_id))]
    async fn handle(
        &self,
        args: Option<Value>,
        state: &ServerState,
        ctx: &RequestContext,
    ) -> Result<Value, RpcError> {
        let args = args.as_ref();
        let session_id = require_string(args, "sessionId")?;
        let batch_id = optional_string(args, "batchId");
        let messages = parse_messages(args)?;

        let summary = Self::summarize(state, &messages).await;

        let session = state.sessions.update_session(&session_id, |s| {
            s.messages.extend(messages.iter().cloned());
            s.summary = summary.clone();
        })?;

        push_instruction(
            state,
            &session.id,
            &session.user_id,
            LocalInstruction::new(
                InstructionType::ShortMemory,
                format!("short_memory/{}.json", session.id),
                json!({
                    "sessionId": session.id,
                    "summary": summary,
                    "batchId": batch_id,
                    "messageCount": session.messages.len(),
                }),
            )
            .with_options(InstructionOptions {
                create_dir: true,
                ..InstructionOptions::default()
            }),
        );

        Ok(json!({
            "success": true,
            "messageCount": session.messages.len(),
            "summary": summary,
        }))
    }
}
