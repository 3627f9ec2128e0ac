//! `associate_file` and `record_edit`: session code-context maintenance.
//!
//! Both mutate the session under the store's serialized write path and
//! emit a `code_context` local instruction so the client mirrors the
//! association on disk.

use async_trait::async_trait;
use recall_core::instruction::{InstructionOptions, InstructionType, LocalInstruction};
use recall_core::session::{CodeFile, EditAction, EditType};
use serde_json::{Value, json};
use tracing::instrument;

use crate::rpc::context::RequestContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{optional_string, push_instruction, require_string};
use crate::rpc::registry::ToolHandler;
use crate::state::ServerState;

fn code_context_instruction(session: &recall_core::session::Session) -> LocalInstruction {
    let files: Vec<&str> = session.code_context.keys().map(String::as_str).collect();
    LocalInstruction::new(
        InstructionType::CodeContext,
        format!("code_context/{}.json", session.id),
        json!({
            "sessionId": session.id,
            "files": files,
            "editCount": session.edit_history.len(),
        }),
    )
    .with_options(InstructionOptions {
        create_dir: true,
        merge: true,
        ..InstructionOptions::default()
    })
}

/// Handles `associate_file`.
pub struct AssociateFileHandler;

#[async_trait]
impl ToolHandler for AssociateFileHandler {
    #[instrument(skip_all, fields(method = "associate_file", trace_id = %ctx.trace_id))]
    async fn handle(
        &self,
        args: Option<Value>,
        state: &ServerState,
        ctx: &RequestContext,
    ) -> Result<Value, RpcError> {
        let args = args.as_ref();
        let session_id = require_string(args, "sessionId")?;
        let file_path = require_string(args, "filePath")?;
        let language = optional_string(args, "language").unwrap_or_default();
        let summary = optional_string(args, "summary").unwrap_or_default();

        let session = state.sessions.update_session(&session_id, |s| {
            s.associate_file(CodeFile {
                path: file_path.clone(),
                language,
                last_edit_unix: 0,
                summary,
            });
        })?;

        push_instruction(
            state,
            &session.id,
            &session.user_id,
            code_context_instruction(&session),
        );

        Ok(json!({
            "success": true,
            "fileCount": session.code_context.len(),
        }))
    }
}

/// Handles `record_edit`.
pub struct RecordEditHandler;

#[async_trait]
impl ToolHandler for RecordEditHandler {
    #[instrument(skip_all, fields(method = "record_edit", trace_id = %ctx.trace_id))]
    async fn handle(
        &self,
        args: Option<Value>,
        state: &ServerState,
        ctx: &RequestContext,
    ) -> Result<Value, RpcError> {
        let args = args.as_ref();
        let session_id = require_string(args, "sessionId")?;
        let file_path = require_string(args, "filePath")?;
        let diff = require_string(args, "diff")?;
        let edit_type = match optional_string(args, "type").as_deref() {
            Some("insert") => EditType::Insert,
            Some("delete") => EditType::Delete,
            Some("modify") | None => EditType::Modify,
            Some(other) => {
                return Err(RpcError::invalid_params(format!(
                    "unknown edit type: {other}"
                )));
            }
        };

        let session = state.sessions.update_session(&session_id, |s| {
            s.record_edit(EditAction::new(file_path.clone(), edit_type, diff.clone()));
        })?;

        push_instruction(
            state,
            &session.id,
            &session.user_id,
            code_context_instruction(&session),
        );

        Ok(json!({
            "success": true,
            "editCount": session.edit_history.len(),
        }))
    }
}
