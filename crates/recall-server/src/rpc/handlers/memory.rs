//! `memorize_context`, `retrieve_memory`, `retrieve_todos`.
//!
//! Retrieval is gated on an initialized user: an uninitialized user gets a
//! structured init-required envelope — never an error code — so the client
//! can drive the init dialog.

use async_trait::async_trait;
use recall_core::memory::{BizType, Memory, MemoryPriority};
use recall_store::TodoStatus;
use serde_json::{Value, json};
use tracing::instrument;

use crate::rpc::context::RequestContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{optional_string, optional_u64, require_string};
use crate::rpc::registry::ToolHandler;
use crate::state::ServerState;

/// Default listing cap for memory retrieval.
const DEFAULT_MEMORY_LIMIT: usize = 20;

fn memory_dto(memory: &Memory) -> Value {
    json!({
        "id": memory.id,
        "sessionId": memory.session_id,
        "content": memory.content,
        "priority": memory.priority,
        "bizType": memory.biz_type,
        "metadata": memory.metadata,
        "timestamp": memory.timestamp.to_rfc3339(),
    })
}

fn resolve_user(state: &ServerState, args: Option<&Value>, session_id: &str) -> Result<String, RpcError> {
    if let Some(user) = optional_string(args, "userId").or_else(|| optional_string(args, "userID")) {
        return Ok(user);
    }
    Ok(state.sessions.get_session(session_id)?.user_id)
}

/// Handles `memorize_context`.
pub struct MemorizeContextHandler;

#[async_trait]
impl ToolHandler for MemorizeContextHandler {
    #[instrument(skip_all, fields(method = "memorize_context", trace_id = %ctx.trace_id))]
    async fn handle(
        &self,
        args: Option<Value>,
        state: &ServerState,
        ctx: &RequestContext,
    ) -> Result<Value, RpcError> {
        let args = args.as_ref();
        let session_id = require_string(args, "sessionId")?;
        let content = require_string(args, "content")?;
        let user_id = resolve_user(state, args, &session_id)?;

        let priority = match optional_string(args, "priority") {
            Some(label) => MemoryPriority::parse(&label)
                .ok_or_else(|| RpcError::invalid_params(format!("unknown priority: {label}")))?,
            None => MemoryPriority::default(),
        };

        let mut memory = Memory::new(&session_id, &user_id, content, priority);
        if let Some(batch_id) = optional_string(args, "batchId") {
            let _ = memory.metadata.insert("batchId".into(), json!(batch_id));
        }
        if let Some(metadata) = args.and_then(|a| a.get("metadata")).and_then(Value::as_object) {
            memory.metadata.extend(metadata.clone());
            // An explicit classification wins over the content heuristic.
            if metadata.get("bizType").and_then(Value::as_str) == Some("todo") {
                memory.biz_type = BizType::Todo;
            }
        }

        let dto = memory_dto(&memory);
        state.memories.store(memory)?;
        Ok(json!({
            "memoryId": dto["id"],
            "bizType": dto["bizType"],
            "priority": dto["priority"],
        }))
    }
}

/// Handles `retrieve_memory`.
pub struct RetrieveMemoryHandler;

#[async_trait]
impl ToolHandler for RetrieveMemoryHandler {
    #[instrument(skip_all, fields(method = "retrieve_memory", trace_id = %ctx.trace_id))]
    async fn handle(
        &self,
        args: Option<Value>,
        state: &ServerState,
        ctx: &RequestContext,
    ) -> Result<Value, RpcError> {
        let args = args.as_ref();
        let session_id = require_string(args, "sessionId")?;
        let user_id = resolve_user(state, args, &session_id)?;

        // Uninitialized users receive the init envelope, not an error, so
        // the client can run the dialog.
        if !state.users.is_initialized(&user_id) {
            return Ok(json!({
                "needInit": true,
                "initPrompt": "User is not initialized. Call user_init_dialog to begin.",
                "memories": [],
            }));
        }

        if let Some(memory_id) = optional_string(args, "memoryId") {
            let memory = state.memories.get(&user_id, &memory_id)?;
            return Ok(json!({
                "needInit": false,
                "memories": [memory_dto(&memory)],
            }));
        }

        // Listing skips relevance thresholds: everything recent comes back,
        // optionally narrowed to one ingestion batch.
        let batch_id = optional_string(args, "batchId");
        let memories: Vec<Value> = state
            .memories
            .list(&user_id, Some(DEFAULT_MEMORY_LIMIT))
            .iter()
            .filter(|m| {
                batch_id.as_deref().is_none_or(|batch| {
                    m.metadata.get("batchId").and_then(Value::as_str) == Some(batch)
                })
            })
            .map(memory_dto)
            .collect();
        Ok(json!({
            "needInit": false,
            "memories": memories,
        }))
    }
}

/// Handles `retrieve_todos`.
pub struct RetrieveTodosHandler;

#[async_trait]
impl ToolHandler for RetrieveTodosHandler {
    #[instrument(skip_all, fields(method = "retrieve_todos", trace_id = %ctx.trace_id))]
    async fn handle(
        &self,
        args: Option<Value>,
        state: &ServerState,
        ctx: &RequestContext,
    ) -> Result<Value, RpcError> {
        let args = args.as_ref();
        let user_id = optional_string(args, "userId")
            .or_else(|| optional_string(args, "userID"))
            .map_or_else(
                || {
                    let session_id = require_string(args, "sessionId")?;
                    resolve_user(state, args, &session_id)
                },
                Ok,
            )?;

        let status = TodoStatus::parse(&optional_string(args, "status").unwrap_or_default());
        let limit = optional_u64(args, "limit").map(|l| l as usize);

        let todos: Vec<Value> = state
            .memories
            .list_todos(&user_id, status, limit)
            .iter()
            .map(memory_dto)
            .collect();
        Ok(json!({
            "todos": todos,
            "count": todos.len(),
        }))
    }
}
