//! Memory record store.
//!
//! Records live per user; todos are the `bizType=TODO` slice. Persistence
//! is one JSON document per user under `short_memory/`.

use dashmap::DashMap;
use parking_lot::RwLock;
use recall_core::errors::{RecallError, Result};
use recall_core::memory::{BizType, Memory};
use tracing::warn;

use crate::layout::DataLayout;

/// Todo listing filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TodoStatus {
    /// Every todo regardless of completion marker.
    #[default]
    All,
    /// Todos without a `completed` metadata marker.
    Open,
    /// Todos with a truthy `completed` metadata marker.
    Completed,
}

impl TodoStatus {
    /// Parse a filter label; unknown labels mean `All`.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "open" | "pending" => Self::Open,
            "completed" | "done" => Self::Completed,
            _ => Self::All,
        }
    }

    fn matches(self, memory: &Memory) -> bool {
        let completed = memory
            .metadata
            .get("completed")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        match self {
            Self::All => true,
            Self::Open => !completed,
            Self::Completed => completed,
        }
    }
}

/// Per-user memory records.
pub struct MemoryStore {
    records: DashMap<String, RwLock<Vec<Memory>>>,
    layout: Option<DataLayout>,
}

impl MemoryStore {
    /// Purely in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            records: DashMap::new(),
            layout: None,
        }
    }

    /// Store persisting through the given layout; existing records are
    /// hydrated lazily per user.
    #[must_use]
    pub fn with_layout(layout: DataLayout) -> Self {
        Self {
            records: DashMap::new(),
            layout: Some(layout),
        }
    }

    fn ensure_user(&self, user_id: &str) {
        if self.records.contains_key(user_id) {
            return;
        }
        let hydrated: Vec<Memory> = self
            .layout
            .as_ref()
            .and_then(|layout| {
                let path = layout.memories_file(user_id);
                match layout.read_json(&path) {
                    Ok(Some(value)) => serde_json::from_value(value)
                        .map_err(|e| warn!(user_id, error = %e, "skipping corrupt memories file"))
                        .ok(),
                    Ok(None) => None,
                    Err(e) => {
                        warn!(user_id, error = %e, "failed to read memories file");
                        None
                    }
                }
            })
            .unwrap_or_default();
        let _ = self
            .records
            .entry(user_id.to_owned())
            .or_insert_with(|| RwLock::new(hydrated));
    }

    fn persist(&self, user_id: &str) -> Result<()> {
        let Some(ref layout) = self.layout else {
            return Ok(());
        };
        let Some(entry) = self.records.get(user_id) else {
            return Ok(());
        };
        let snapshot: Vec<Memory> = entry.value().read().clone();
        layout.write_json(&layout.memories_file(user_id), &snapshot)
    }

    /// Append a memory record.
    pub fn store(&self, memory: Memory) -> Result<()> {
        if memory.content.trim().is_empty() {
            return Err(RecallError::InvalidArgument("memory content is empty".into()));
        }
        let user_id = memory.user_id.clone();
        self.ensure_user(&user_id);
        if let Some(entry) = self.records.get(&user_id) {
            entry.value().write().push(memory);
        }
        self.persist(&user_id)
    }

    /// Fetch one record by id.
    pub fn get(&self, user_id: &str, memory_id: &str) -> Result<Memory> {
        self.ensure_user(user_id);
        self.records
            .get(user_id)
            .and_then(|entry| {
                entry
                    .value()
                    .read()
                    .iter()
                    .find(|m| m.id == memory_id)
                    .cloned()
            })
            .ok_or_else(|| {
                RecallError::InvalidArgument(format!("memory not found: {memory_id}"))
            })
    }

    /// All records of one user, newest first.
    #[must_use]
    pub fn list(&self, user_id: &str, limit: Option<usize>) -> Vec<Memory> {
        self.ensure_user(user_id);
        let mut out: Vec<Memory> = self
            .records
            .get(user_id)
            .map(|entry| entry.value().read().clone())
            .unwrap_or_default();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        out
    }

    /// Todos of one user filtered by status, newest first.
    #[must_use]
    pub fn list_todos(&self, user_id: &str, status: TodoStatus, limit: Option<usize>) -> Vec<Memory> {
        self.ensure_user(user_id);
        let mut out: Vec<Memory> = self
            .records
            .get(user_id)
            .map(|entry| {
                entry
                    .value()
                    .read()
                    .iter()
                    .filter(|m| m.biz_type == BizType::Todo && status.matches(m))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::memory::MemoryPriority;
    use serde_json::json;

    fn todo(user: &str, content: &str) -> Memory {
        Memory::new("sess_a", user, content, MemoryPriority::P2)
    }

    #[test]
    fn store_and_get_roundtrip() {
        let store = MemoryStore::in_memory();
        let m = todo("u1", "TODO: write tests");
        let id = m.id.clone();
        store.store(m).unwrap();
        let back = store.get("u1", &id).unwrap();
        assert_eq!(back.id, id);
        assert_eq!(back.biz_type, BizType::Todo);
    }

    #[test]
    fn empty_content_is_rejected() {
        let store = MemoryStore::in_memory();
        let err = store.store(todo("u1", "   ")).unwrap_err();
        assert!(matches!(err, RecallError::InvalidArgument(_)));
    }

    #[test]
    fn todos_filtered_from_general_memories() {
        let store = MemoryStore::in_memory();
        store.store(todo("u1", "TODO: a")).unwrap();
        store.store(todo("u1", "plain fact")).unwrap();
        store.store(todo("u1", "- [ ] b")).unwrap();
        let todos = store.list_todos("u1", TodoStatus::All, None);
        assert_eq!(todos.len(), 2);
        assert!(todos.iter().all(|m| m.biz_type == BizType::Todo));
    }

    #[test]
    fn todo_status_filter_uses_completed_marker() {
        let store = MemoryStore::in_memory();
        let mut done = todo("u1", "TODO: done one");
        let _ = done.metadata.insert("completed".into(), json!(true));
        store.store(done).unwrap();
        store.store(todo("u1", "TODO: open one")).unwrap();

        assert_eq!(store.list_todos("u1", TodoStatus::Open, None).len(), 1);
        assert_eq!(store.list_todos("u1", TodoStatus::Completed, None).len(), 1);
        assert_eq!(store.list_todos("u1", TodoStatus::All, None).len(), 2);
    }

    #[test]
    fn todo_status_parse() {
        assert_eq!(TodoStatus::parse("OPEN"), TodoStatus::Open);
        assert_eq!(TodoStatus::parse("done"), TodoStatus::Completed);
        assert_eq!(TodoStatus::parse("all"), TodoStatus::All);
        assert_eq!(TodoStatus::parse("whatever"), TodoStatus::All);
    }

    #[test]
    fn list_newest_first_with_limit() {
        let store = MemoryStore::in_memory();
        for i in 0..5 {
            let mut m = todo("u1", &format!("fact {i}"));
            m.timestamp = chrono::Utc::now() + chrono::Duration::milliseconds(i);
            store.store(m).unwrap();
        }
        let listed = store.list("u1", Some(2));
        assert_eq!(listed.len(), 2);
        assert!(listed[0].timestamp >= listed[1].timestamp);
    }

    #[test]
    fn users_are_isolated() {
        let store = MemoryStore::in_memory();
        store.store(todo("u1", "TODO: mine")).unwrap();
        assert!(store.list_todos("u2", TodoStatus::All, None).is_empty());
    }

    #[test]
    fn persists_and_hydrates() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let id = {
            let store = MemoryStore::with_layout(layout.clone());
            let m = todo("u1", "TODO: persist me");
            let id = m.id.clone();
            store.store(m).unwrap();
            id
        };
        let store = MemoryStore::with_layout(layout);
        let back = store.get("u1", &id).unwrap();
        assert_eq!(back.content, "TODO: persist me");
    }
}
