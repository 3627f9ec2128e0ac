//! Request context and pre-dispatch injection.
//!
//! Before a tool handler runs, the dispatcher resolves the request's
//! `sessionID` (when present) into `(user, workspace path, workspace
//! hash)` and binds them into a [`RequestContext`], so handlers read
//! identity without re-lookup. Injection also refreshes the session's
//! `last_active`; a failing refresh is logged and never fails the request.

use std::time::{Duration, Instant};

use recall_core::ids;
use serde_json::Value;
use tracing::debug;

use crate::state::ServerState;

/// Identity and deadline carried through one request.
#[derive(Clone, Debug)]
pub struct RequestContext {
    /// Bound session, when the request named one.
    pub session_id: Option<String>,
    /// Owning user of the bound session.
    pub user_id: Option<String>,
    /// Workspace path recorded at session creation.
    pub workspace_path: Option<String>,
    /// Workspace fingerprint of the bound session.
    pub workspace_hash: Option<String>,
    /// Request trace id; threads every log line.
    pub trace_id: String,
    /// Outer request deadline.
    pub deadline: Instant,
}

impl RequestContext {
    /// Fresh context with the given outer timeout.
    #[must_use]
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            session_id: None,
            user_id: None,
            workspace_path: None,
            workspace_hash: None,
            trace_id: ids::new_trace_id(),
            deadline: Instant::now() + request_timeout,
        }
    }

    /// The bound user id or an invalid-params complaint.
    pub fn require_user(&self) -> Result<&str, super::errors::RpcError> {
        self.user_id.as_deref().ok_or_else(|| {
            super::errors::RpcError::invalid_params("request has no bound user (missing sessionId?)")
        })
    }

    /// The bound session id or an invalid-params complaint.
    pub fn require_session(&self) -> Result<&str, super::errors::RpcError> {
        self.session_id.as_deref().ok_or_else(|| {
            super::errors::RpcError::invalid_params("Missing required parameter: sessionId")
        })
    }
}

/// Whether injection applies to this tool under the intercept scope.
/// An empty scope list means every tool.
fn in_scope(state: &ServerState, tool_name: &str) -> bool {
    let scope = &state.settings.intercept.mcp_tools;
    scope.is_empty() || scope.iter().any(|t| t == tool_name)
}

/// Resolve the request's session and bind identity into the context.
pub fn inject_context(
    state: &ServerState,
    tool_name: &str,
    arguments: Option<&Value>,
    ctx: &mut RequestContext,
) {
    if !in_scope(state, tool_name) {
        return;
    }
    let Some(session_id) = arguments
        .and_then(|a| a.get("sessionId"))
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
    else {
        return;
    };

    let Ok(session) = state.sessions.get_session(session_id) else {
        debug!(session_id, trace_id = %ctx.trace_id, "injection skipped: session unknown");
        return;
    };

    ctx.session_id = Some(session.id.clone());
    ctx.user_id = Some(session.user_id.clone());
    ctx.workspace_hash = Some(session.workspace_hash.clone());
    ctx.workspace_path = session
        .metadata
        .get("workspacePath")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);

    // Activity update; save failures are logged inside the store.
    state.sessions.touch_session(session_id);
    debug!(
        session_id,
        user_id = %session.user_id,
        workspace_hash = %session.workspace_hash,
        trace_id = %ctx.trace_id,
        "request context injected"
    );
}
