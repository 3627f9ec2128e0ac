//! `local_operation_callback`: deliver a client ack to the push channel.

use async_trait::async_trait;
use recall_core::instruction::InstructionAck;
use serde_json::{Value, json};
use tracing::instrument;

use crate::rpc::context::RequestContext;
use crate::rpc::errors::RpcError;
use crate::rpc::handlers::{optional_string, require_string};
use crate::rpc::registry::ToolHandler;
use crate::state::ServerState;

/// Handles `local_operation_callback`.
pub struct LocalOperationCallbackHandler;

#[async_trait]
impl ToolHandler for LocalOperationCallbackHandler {
    #[instrument(skip_all, fields(method = "local_operation_callback", trace_id = %ctx.trace_id))]
    async fn handle(
        &self,
        args: Option<Value>,
        state: &ServerState,
        ctx: &RequestContext,
    ) -> Result<Value, RpcError> {
        let args = args.as_ref();
        let callback_id = require_string(args, "callbackId")?;
        let success = args
            .and_then(|a| a.get("success"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let data = args.and_then(|a| a.get("data")).cloned();
        let error = optional_string(args, "error");

        state.push.ack_callback(InstructionAck {
            callback_id,
            success,
            data,
            error,
        });
        Ok(json!({"acknowledged": true}))
    }
}
