//! Tool names, the handler contract, and the dispatch registry.
//!
//! Tool names are a closed enum mapped to handlers at startup; unknown
//! names produce `-32601`. Dispatch injects the request context first,
//! then routes.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::instrument;

use crate::rpc::context::{RequestContext, inject_context};
use crate::rpc::errors::RpcError;
use crate::rpc::handlers;
use crate::state::ServerState;

/// The closed tool set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolName {
    /// Resolve or create the session for a workspace.
    SessionManagement,
    /// Upsert a file association.
    AssociateFile,
    /// Append an edit record.
    RecordEdit,
    /// Run the retrieve-synthesize pipeline.
    RetrieveContext,
    /// Persist conversation messages with a summary.
    StoreConversation,
    /// Store a memory record.
    MemorizeContext,
    /// Fetch memory records.
    RetrieveMemory,
    /// List todo memories.
    RetrieveTodos,
    /// Drive the user-init dialog.
    UserInitDialog,
    /// Deliver a client ack for a pushed instruction.
    LocalOperationCallback,
}

impl ToolName {
    /// Every tool, in listing order.
    pub const ALL: [Self; 10] = [
        Self::SessionManagement,
        Self::AssociateFile,
        Self::RecordEdit,
        Self::RetrieveContext,
        Self::StoreConversation,
        Self::MemorizeContext,
        Self::RetrieveMemory,
        Self::RetrieveTodos,
        Self::UserInitDialog,
        Self::LocalOperationCallback,
    ];

    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionManagement => "session_management",
            Self::AssociateFile => "associate_file",
            Self::RecordEdit => "record_edit",
            Self::RetrieveContext => "retrieve_context",
            Self::StoreConversation => "store_conversation",
            Self::MemorizeContext => "memorize_context",
            Self::RetrieveMemory => "retrieve_memory",
            Self::RetrieveTodos => "retrieve_todos",
            Self::UserInitDialog => "user_init_dialog",
            Self::LocalOperationCallback => "local_operation_callback",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    fn description(self) -> &'static str {
        match self {
            Self::SessionManagement => "Resolve or create the active session for a user and workspace",
            Self::AssociateFile => "Associate a code file with the session",
            Self::RecordEdit => "Record an edit action against a session file",
            Self::RetrieveContext => "Retrieve and synthesize programming context for a query",
            Self::StoreConversation => "Store conversation messages and summarize them",
            Self::MemorizeContext => "Store a memory record (todos are detected automatically)",
            Self::RetrieveMemory => "Retrieve stored memory records",
            Self::RetrieveTodos => "List todo items",
            Self::UserInitDialog => "Drive the user initialization dialog",
            Self::LocalOperationCallback => "Acknowledge a pushed local instruction",
        }
    }

    /// Descriptor for `tools/list`.
    #[must_use]
    pub fn descriptor(self) -> Value {
        json!({
            "name": self.as_str(),
            "description": self.description(),
            "inputSchema": {"type": "object"},
        })
    }
}

/// One tool handler.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Handle one invocation.
    async fn handle(
        &self,
        args: Option<Value>,
        state: &ServerState,
        ctx: &RequestContext,
    ) -> Result<Value, RpcError>;
}

/// Tool name → handler mapping, built once at startup.
pub struct ToolRegistry {
    handlers: HashMap<ToolName, Box<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// Registry with the full tool set.
    #[must_use]
    pub fn with_default_tools() -> Self {
        let mut handlers: HashMap<ToolName, Box<dyn ToolHandler>> = HashMap::new();
        let _ = handlers.insert(
            ToolName::SessionManagement,
            Box::new(handlers::session::SessionManagementHandler),
        );
        let _ = handlers.insert(
            ToolName::AssociateFile,
            Box::new(handlers::files::AssociateFileHandler),
        );
        let _ = handlers.insert(
            ToolName::RecordEdit,
            Box::new(handlers::files::RecordEditHandler),
        );
        let _ = handlers.insert(
            ToolName::RetrieveContext,
            Box::new(handlers::retrieve::RetrieveContextHandler),
        );
        let _ = handlers.insert(
            ToolName::StoreConversation,
            Box::new(handlers::conversation::StoreConversationHandler),
        );
        let _ = handlers.insert(
            ToolName::MemorizeContext,
            Box::new(handlers::memory::MemorizeContextHandler),
        );
        let _ = handlers.insert(
            ToolName::RetrieveMemory,
            Box::new(handlers::memory::RetrieveMemoryHandler),
        );
        let _ = handlers.insert(
            ToolName::RetrieveTodos,
            Box::new(handlers::memory::RetrieveTodosHandler),
        );
        let _ = handlers.insert(
            ToolName::UserInitDialog,
            Box::new(handlers::user_init::UserInitDialogHandler),
        );
        let _ = handlers.insert(
            ToolName::LocalOperationCallback,
            Box::new(handlers::callback::LocalOperationCallbackHandler),
        );
        Self { handlers }
    }

    /// Tool descriptors for `tools/list`.
    #[must_use]
    pub fn list_tools(&self) -> Value {
        let tools: Vec<Value> = ToolName::ALL.iter().map(|t| t.descriptor()).collect();
        json!({"tools": tools})
    }

    /// Route one `tools/call`: inject context, update activity, dispatch.
    #[instrument(skip(self, state, arguments), fields(tool = name))]
    pub async fn dispatch(
        &self,
        state: &ServerState,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<Value, RpcError> {
        let tool = ToolName::parse(name)
            .ok_or_else(|| RpcError::MethodNotFound(name.to_owned()))?;
        let handler = self
            .handlers
            .get(&tool)
            .ok_or_else(|| RpcError::MethodNotFound(name.to_owned()))?;

        let mut ctx = RequestContext::new(state.settings.timeouts.request);
        inject_context(state, name, arguments.as_ref(), &mut ctx);
        handler.handle(arguments, state, &ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testutil::test_state;

    #[test]
    fn every_tool_parses_its_own_name() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::parse(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolName::parse("mystery_tool"), None);
    }

    #[test]
    fn list_tools_covers_the_full_set() {
        let registry = ToolRegistry::with_default_tools();
        let listed = registry.list_tools();
        let tools = listed["tools"].as_array().unwrap();
        assert_eq!(tools.len(), ToolName::ALL.len());
        assert!(tools.iter().any(|t| t["name"] == "retrieve_context"));
    }

    #[tokio::test]
    async fn unknown_tool_maps_to_method_not_found() {
        let registry = ToolRegistry::with_default_tools();
        let state = test_state();
        let err = registry
            .dispatch(&state, "mystery_tool", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32601);
    }
}
