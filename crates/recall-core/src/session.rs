//! Session records: the active editing context for one `(user, workspace)`.
//!
//! A session exclusively owns its messages, code context, and edit history.
//! `workspace_hash` is immutable once set; `last_active` only moves forward.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids;

/// Session lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session is live and reusable within the timeout window.
    #[default]
    Active,
    /// Session aged out or was closed; kept for history.
    Archived,
}

/// One message of a stored conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    /// Speaker role (`user`, `assistant`, `system`).
    pub role: String,
    /// Message body.
    pub content: String,
    /// Time the message was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A file the session is working with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeFile {
    /// Workspace-relative or absolute file path; keys the file within a session.
    pub path: String,
    /// Detected or declared language.
    #[serde(default)]
    pub language: String,
    /// Unix seconds of the last recorded edit.
    #[serde(default)]
    pub last_edit_unix: i64,
    /// One-line summary of the file's role.
    #[serde(default)]
    pub summary: String,
}

/// Kind of edit recorded against a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditType {
    /// Content added.
    Insert,
    /// Content removed.
    Delete,
    /// Content changed in place.
    Modify,
}

/// Append-only edit record attached to a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditAction {
    /// Unique edit id (`edit_…`).
    pub id: String,
    /// Time the edit was recorded.
    pub timestamp: DateTime<Utc>,
    /// File the edit applies to.
    pub file_path: String,
    /// Kind of edit.
    #[serde(rename = "type")]
    pub edit_type: EditType,
    /// Byte or line position, when the client reported one.
    #[serde(default)]
    pub position: i64,
    /// Edit payload (diff or inserted text).
    #[serde(default)]
    pub content: String,
    /// Free-form labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl EditAction {
    /// Create a new edit record stamped now.
    #[must_use]
    pub fn new(file_path: impl Into<String>, edit_type: EditType, content: impl Into<String>) -> Self {
        Self {
            id: ids::new_edit_id(),
            timestamp: Utc::now(),
            file_path: file_path.into(),
            edit_type,
            position: 0,
            content: content.into(),
            tags: Vec::new(),
        }
    }
}

/// Active editing context, unique per `(user, workspace)` within the timeout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Globally unique session id (`sess_…`).
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Immutable workspace fingerprint.
    pub workspace_hash: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last activity time; monotonically non-decreasing.
    pub last_active: DateTime<Utc>,
    /// Lifecycle state.
    #[serde(default)]
    pub status: SessionStatus,
    /// Arbitrary session metadata (workspace path, source, …).
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    /// Files associated with this session, keyed by path.
    #[serde(default)]
    pub code_context: BTreeMap<String, CodeFile>,
    /// Append-only edit history.
    #[serde(default)]
    pub edit_history: Vec<EditAction>,
    /// Stored conversation messages.
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
    /// Rolling conversation summary.
    #[serde(default)]
    pub summary: String,
}

impl Session {
    /// Create a new active session for `(user, workspace)` stamped now.
    #[must_use]
    pub fn new(user_id: impl Into<String>, workspace_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ids::new_session_id(),
            user_id: user_id.into(),
            workspace_hash: workspace_hash.into(),
            created_at: now,
            last_active: now,
            status: SessionStatus::Active,
            metadata: serde_json::Map::new(),
            code_context: BTreeMap::new(),
            edit_history: Vec::new(),
            messages: Vec::new(),
            summary: String::new(),
        }
    }

    /// Advance `last_active` to now. Never moves backwards, so two
    /// successive reads always observe a non-decreasing value.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_active {
            self.last_active = now;
        }
    }

    /// Expiry predicate: non-active status, or idle longer than `timeout`.
    #[must_use]
    pub fn is_expired(&self, timeout: Duration) -> bool {
        if self.status != SessionStatus::Active {
            return true;
        }
        let idle = Utc::now().signed_duration_since(self.last_active);
        idle.to_std().map_or(false, |idle| idle > timeout)
    }

    /// Upsert a code file association; keyed by path.
    pub fn associate_file(&mut self, file: CodeFile) {
        let _ = self.code_context.insert(file.path.clone(), file);
    }

    /// Append an edit record and refresh the file's `last_edit_unix`.
    pub fn record_edit(&mut self, edit: EditAction) {
        if let Some(file) = self.code_context.get_mut(&edit.file_path) {
            file.last_edit_unix = edit.timestamp.timestamp();
        }
        self.edit_history.push(edit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_active_with_matching_timestamps() {
        let s = Session::new("u1", "abcd1234abcd1234");
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.created_at, s.last_active);
        assert!(s.id.starts_with("sess_"));
    }

    #[test]
    fn touch_is_monotonic() {
        let mut s = Session::new("u1", "ws");
        let before = s.last_active;
        std::thread::sleep(std::time::Duration::from_millis(2));
        s.touch();
        assert!(s.last_active >= before);
        let mid = s.last_active;
        s.touch();
        assert!(s.last_active >= mid);
    }

    #[test]
    fn archived_session_is_expired_regardless_of_activity() {
        let mut s = Session::new("u1", "ws");
        s.status = SessionStatus::Archived;
        assert!(s.is_expired(Duration::from_secs(3600)));
    }

    #[test]
    fn fresh_active_session_is_not_expired() {
        let s = Session::new("u1", "ws");
        assert!(!s.is_expired(Duration::from_secs(1800)));
    }

    #[test]
    fn idle_session_expires() {
        let mut s = Session::new("u1", "ws");
        s.last_active = Utc::now() - chrono::Duration::minutes(45);
        assert!(s.is_expired(Duration::from_secs(30 * 60)));
        assert!(!s.is_expired(Duration::from_secs(60 * 60)));
    }

    #[test]
    fn associate_file_upserts_by_path() {
        let mut s = Session::new("u1", "ws");
        s.associate_file(CodeFile {
            path: "src/main.rs".into(),
            language: "rust".into(),
            last_edit_unix: 0,
            summary: String::new(),
        });
        s.associate_file(CodeFile {
            path: "src/main.rs".into(),
            language: "rust".into(),
            last_edit_unix: 42,
            summary: "entry point".into(),
        });
        assert_eq!(s.code_context.len(), 1);
        assert_eq!(s.code_context["src/main.rs"].last_edit_unix, 42);
    }

    #[test]
    fn record_edit_appends_and_updates_file_stamp() {
        let mut s = Session::new("u1", "ws");
        s.associate_file(CodeFile {
            path: "src/lib.rs".into(),
            language: "rust".into(),
            last_edit_unix: 0,
            summary: String::new(),
        });
        let edit = EditAction::new("src/lib.rs", EditType::Modify, "- old\n+ new");
        let stamp = edit.timestamp.timestamp();
        s.record_edit(edit);
        assert_eq!(s.edit_history.len(), 1);
        assert_eq!(s.code_context["src/lib.rs"].last_edit_unix, stamp);
    }

    #[test]
    fn serde_roundtrip_camel_case() {
        let mut s = Session::new("u1", "ws");
        s.record_edit(EditAction::new("a.rs", EditType::Insert, "fn f() {}"));
        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("workspaceHash").is_some());
        assert!(json.get("lastActive").is_some());
        assert_eq!(json["editHistory"][0]["type"], "insert");
        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn status_wire_format_is_snake_case() {
        assert_eq!(
            serde_json::to_value(SessionStatus::Active).unwrap(),
            serde_json::json!("active")
        );
        assert_eq!(
            serde_json::to_value(SessionStatus::Archived).unwrap(),
            serde_json::json!("archived")
        );
    }
}
