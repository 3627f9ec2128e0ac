//! Sharded session store.
//!
//! Sessions are keyed by user shard; iteration within a shard returns
//! insertion order, and cross-shard listings order by `last_active`
//! descending. All writes to a session serialize behind its shard's write
//! lock, which also makes `get_or_create` linearizable per user.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use recall_core::errors::{RecallError, Result};
use recall_core::session::{Session, SessionStatus};
use tracing::{debug, warn};

use crate::layout::DataLayout;

/// Listing filter.
#[derive(Clone, Debug, Default)]
pub struct SessionFilter {
    /// Only sessions of this workspace.
    pub workspace_hash: Option<String>,
    /// Include archived sessions.
    pub include_archived: bool,
    /// Cap on returned sessions.
    pub limit: Option<usize>,
}

#[derive(Default)]
struct ShardInner {
    /// Insertion order of session ids.
    order: Vec<String>,
    sessions: HashMap<String, Session>,
}

struct Shard {
    inner: RwLock<ShardInner>,
}

/// Keyed session store, sharded by user.
pub struct SessionStore {
    shards: DashMap<String, Arc<Shard>>,
    /// session id → user id, for id-only lookups.
    session_index: DashMap<String, String>,
    layout: Option<DataLayout>,
}

impl SessionStore {
    /// Purely in-memory store (tests, ephemeral deployments).
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            shards: DashMap::new(),
            session_index: DashMap::new(),
            layout: None,
        }
    }

    /// Store persisting through the given disk layout. Existing session
    /// files are hydrated lazily, per user, on first access.
    #[must_use]
    pub fn with_layout(layout: DataLayout) -> Self {
        Self {
            shards: DashMap::new(),
            session_index: DashMap::new(),
            layout: Some(layout),
        }
    }

    fn shard(&self, user_id: &str) -> Arc<Shard> {
        if let Some(existing) = self.shards.get(user_id) {
            return Arc::clone(existing.value());
        }
        let fresh = Arc::new(Shard {
            inner: RwLock::new(ShardInner::default()),
        });
        let entry = self.shards.entry(user_id.to_owned()).or_insert_with(|| {
            if let Some(ref layout) = self.layout {
                Self::hydrate(layout, user_id, &fresh);
            }
            Arc::clone(&fresh)
        });
        let shard = Arc::clone(entry.value());
        drop(entry);
        // Index hydrated sessions outside the dashmap entry lock.
        let inner = shard.inner.read();
        for id in &inner.order {
            let _ = self.session_index.insert(id.clone(), user_id.to_owned());
        }
        drop(inner);
        shard
    }

    fn hydrate(layout: &DataLayout, user_id: &str, shard: &Shard) {
        let files = match layout.list_session_files(user_id) {
            Ok(f) => f,
            Err(e) => {
                warn!(user_id, error = %e, "failed to list session files");
                return;
            }
        };
        let mut loaded: Vec<Session> = Vec::new();
        for path in files {
            match layout.read_json(&path) {
                Ok(Some(value)) => match serde_json::from_value::<Session>(value) {
                    Ok(session) => loaded.push(session),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable session file"),
                },
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable session file"),
            }
        }
        // Oldest first so insertion order mirrors creation order.
        loaded.sort_by_key(|s| s.created_at);
        let mut inner = shard.inner.write();
        for session in loaded {
            inner.order.push(session.id.clone());
            let _ = inner.sessions.insert(session.id.clone(), session);
        }
    }

    fn persist(&self, session: &Session) -> Result<()> {
        if let Some(ref layout) = self.layout {
            let path = layout.session_file(&session.user_id, &session.id);
            layout.write_json(&path, session)?;
        }
        Ok(())
    }

    /// Insert or replace a session. The workspace hash of an existing
    /// session is immutable; a mismatching replacement is rejected.
    pub fn save_session(&self, session: &Session) -> Result<()> {
        let shard = self.shard(&session.user_id);
        {
            let mut inner = shard.inner.write();
            if let Some(existing) = inner.sessions.get(&session.id) {
                if existing.workspace_hash != session.workspace_hash {
                    return Err(RecallError::MismatchedWorkspace {
                        expected: existing.workspace_hash.clone(),
                        actual: session.workspace_hash.clone(),
                    });
                }
            } else {
                inner.order.push(session.id.clone());
            }
            let _ = inner.sessions.insert(session.id.clone(), session.clone());
        }
        let _ = self
            .session_index
            .insert(session.id.clone(), session.user_id.clone());
        self.persist(session)
    }

    /// Fetch a session by id.
    pub fn get_session(&self, session_id: &str) -> Result<Session> {
        let user_id = self
            .session_index
            .get(session_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| RecallError::SessionNotFound(session_id.to_owned()))?;
        let shard = self.shard(&user_id);
        let inner = shard.inner.read();
        inner
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| RecallError::SessionNotFound(session_id.to_owned()))
    }

    /// Apply a mutation to one session under the shard write lock and
    /// persist the result. This is the single paved path for session
    /// writes, so they serialize per id.
    pub fn update_session<F>(&self, session_id: &str, mutate: F) -> Result<Session>
    where
        F: FnOnce(&mut Session),
    {
        let user_id = self
            .session_index
            .get(session_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| RecallError::SessionNotFound(session_id.to_owned()))?;
        let shard = self.shard(&user_id);
        let updated = {
            let mut inner = shard.inner.write();
            let session = inner
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| RecallError::SessionNotFound(session_id.to_owned()))?;
            mutate(session);
            session.clone()
        };
        self.persist(&updated)?;
        Ok(updated)
    }

    /// Refresh `last_active`. Persistence failures are logged, not
    /// surfaced — activity updates never fail a request.
    pub fn touch_session(&self, session_id: &str) {
        match self.update_session(session_id, Session::touch) {
            Ok(_) => {}
            Err(RecallError::SessionNotFound(_)) => {}
            Err(e) => warn!(session_id, error = %e, "failed to persist activity update"),
        }
    }

    /// The unique active session for `(user, workspace)` within the
    /// timeout, or a freshly created one. Linearized behind the shard
    /// write lock, so concurrent callers observe one session.
    pub fn get_or_create_active_session_with_workspace(
        &self,
        user_id: &str,
        workspace_hash: &str,
        timeout: Duration,
    ) -> Result<(Session, bool)> {
        let shard = self.shard(user_id);
        let (session, is_new) = {
            let mut inner = shard.inner.write();
            let reusable = inner
                .order
                .iter()
                .filter_map(|id| inner.sessions.get(id))
                .filter(|s| {
                    s.workspace_hash == workspace_hash
                        && s.status == SessionStatus::Active
                        && !s.is_expired(timeout)
                })
                .max_by_key(|s| s.last_active)
                .map(|s| s.id.clone());

            if let Some(id) = reusable {
                let session = inner
                    .sessions
                    .get_mut(&id)
                    .ok_or_else(|| RecallError::Internal("session vanished under lock".into()))?;
                session.touch();
                (session.clone(), false)
            } else {
                let session = Session::new(user_id, workspace_hash);
                debug!(user_id, workspace_hash, session_id = %session.id, "created session");
                inner.order.push(session.id.clone());
                let _ = inner.sessions.insert(session.id.clone(), session.clone());
                (session, true)
            }
        };
        let _ = self
            .session_index
            .insert(session.id.clone(), user_id.to_owned());
        self.persist(&session)?;
        Ok((session, is_new))
    }

    /// Sessions of one user, insertion order, filtered.
    #[must_use]
    pub fn list_sessions(&self, user_id: &str, filter: &SessionFilter) -> Vec<Session> {
        let shard = self.shard(user_id);
        let inner = shard.inner.read();
        let mut out: Vec<Session> = inner
            .order
            .iter()
            .filter_map(|id| inner.sessions.get(id))
            .filter(|s| {
                (filter.include_archived || s.status == SessionStatus::Active)
                    && filter
                        .workspace_hash
                        .as_deref()
                        .is_none_or(|ws| s.workspace_hash == ws)
            })
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        out
    }

    /// Sessions across all users, `last_active` descending.
    #[must_use]
    pub fn list_all_sessions(&self, filter: &SessionFilter) -> Vec<Session> {
        let mut out: Vec<Session> = Vec::new();
        for entry in &self.shards {
            let inner = entry.value().inner.read();
            out.extend(
                inner
                    .order
                    .iter()
                    .filter_map(|id| inner.sessions.get(id))
                    .filter(|s| {
                        (filter.include_archived || s.status == SessionStatus::Active)
                            && filter
                                .workspace_hash
                                .as_deref()
                                .is_none_or(|ws| s.workspace_hash == ws)
                    })
                    .cloned(),
            );
        }
        out.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        out
    }

    /// Archive every active session idle past `timeout`. Returns the
    /// number archived.
    pub fn archive_expired(&self, timeout: Duration) -> usize {
        let mut archived = 0;
        for entry in &self.shards {
            let mut to_persist = Vec::new();
            {
                let mut inner = entry.value().inner.write();
                for session in inner.sessions.values_mut() {
                    if session.status == SessionStatus::Active && session.is_expired(timeout) {
                        session.status = SessionStatus::Archived;
                        archived += 1;
                        to_persist.push(session.clone());
                    }
                }
            }
            for session in to_persist {
                if let Err(e) = self.persist(&session) {
                    warn!(session_id = %session.id, error = %e, "failed to persist archived session");
                }
            }
        }
        archived
    }
}
