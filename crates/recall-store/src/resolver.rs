//! Identity & workspace resolver.
//!
//! One entry point turns `(user, session?, workspace path)` into a bound
//! session. Explicit session ids are workspace-checked — a session never
//! crosses workspaces; without an id the unique active session for the
//! `(user, workspace)` pair is reused or created.

use std::time::Duration;

use recall_core::errors::{RecallError, Result};
use recall_core::session::Session;
use recall_core::workspace;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use crate::session_store::SessionStore;

/// A resolved session plus whether this call created it.
#[derive(Clone, Debug)]
pub struct ResolvedSession {
    /// The bound session.
    pub session: Session,
    /// True when this resolution created the session.
    pub is_new: bool,
}

/// Resolves request identity against the session store.
pub struct SessionResolver<'a> {
    store: &'a SessionStore,
    timeout: Duration,
}

impl<'a> SessionResolver<'a> {
    /// Resolver over `store` with the active-session window `timeout`.
    #[must_use]
    pub fn new(store: &'a SessionStore, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Resolve a session for a tool call.
    ///
    /// - With `session_id`: load it and fail with `MismatchedWorkspace`
    ///   when its stored hash differs from `hash(workspace_path)`.
    /// - Without: reuse the unique active session for `(user, workspace)`
    ///   within the window, or create one stamped with
    ///   `{workspacePath, workspaceHash, userID, source}` metadata.
    ///
    /// `workspace_path` is mandatory on this path; empty input fails with
    /// `MissingWorkspace` (the socket path uses the process fallback id
    /// instead and never reaches this function with an empty path).
    #[instrument(skip(self, metadata), fields(user_id, source))]
    pub fn resolve_session(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        workspace_path: &str,
        metadata: Map<String, Value>,
        source: &str,
    ) -> Result<ResolvedSession> {
        if user_id.trim().is_empty() {
            return Err(RecallError::InvalidArgument("userID is required".into()));
        }
        let workspace_hash = workspace::workspace_hash(workspace_path)?;

        if let Some(session_id) = session_id.filter(|s| !s.trim().is_empty()) {
            let session = self.store.get_session(session_id)?;
            if session.workspace_hash != workspace_hash {
                return Err(RecallError::MismatchedWorkspace {
                    expected: session.workspace_hash,
                    actual: workspace_hash,
                });
            }
            let session = self.store.update_session(session_id, Session::touch)?;
            return Ok(ResolvedSession {
                session,
                is_new: false,
            });
        }

        let (session, is_new) = self.store.get_or_create_active_session_with_workspace(
            user_id,
            &workspace_hash,
            self.timeout,
        )?;

        if is_new {
            let session = self.store.update_session(&session.id, |s| {
                s.metadata
                    .extend(Self::creation_metadata(workspace_path, &workspace_hash, user_id, source));
                s.metadata.extend(metadata.clone());
            })?;
            debug!(session_id = %session.id, workspace_hash, "session created for workspace");
            return Ok(ResolvedSession {
                session,
                is_new: true,
            });
        }

        Ok(ResolvedSession {
            session,
            is_new: false,
        })
    }

    fn creation_metadata(
        workspace_path: &str,
        workspace_hash: &str,
        user_id: &str,
        source: &str,
    ) -> Map<String, Value> {
        let mut meta = Map::new();
        let _ = meta.insert("workspacePath".into(), json!(workspace::clean_path(workspace_path)));
        let _ = meta.insert("workspaceHash".into(), json!(workspace_hash));
        let _ = meta.insert("userID".into(), json!(user_id));
        let _ = meta.insert("source".into(), json!(source));
        meta
    }
}
