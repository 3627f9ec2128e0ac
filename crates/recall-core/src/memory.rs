//! Memory records: durable facts a session asks the service to keep.
//!
//! Priorities are ordinal: P0 permanent, P1 long-term, P2 medium, P3
//! short-term. Todo items are a business type derived from the content when
//! the client does not tag them explicitly.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids;

/// Retention tier of a memory record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemoryPriority {
    /// Permanent.
    P0,
    /// Long-term.
    P1,
    /// Medium-term.
    #[default]
    P2,
    /// Short-term.
    P3,
}

impl MemoryPriority {
    /// Parse a `"P0"`..`"P3"` label, case-insensitive.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "P0" => Some(Self::P0),
            "P1" => Some(Self::P1),
            "P2" => Some(Self::P2),
            "P3" => Some(Self::P3),
            _ => None,
        }
    }
}

/// Business classification of a memory record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BizType {
    /// Plain remembered context.
    #[default]
    General,
    /// Todo item; listed by `retrieve_todos`.
    Todo,
}

/// Todo content detector: leading `TODO:` / `TODO：` or a markdown
/// unchecked checkbox, case-insensitive.
fn todo_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:-\s*\[\s*\]|todo(?:[:：]\s*|\s))").expect("todo regex is valid")
    })
}

/// Whether content reads as a todo item.
#[must_use]
pub fn is_todo_content(content: &str) -> bool {
    todo_regex().is_match(content)
}

/// A durable memory record owned by `(user, session)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// Unique memory id (`mem_…`).
    pub id: String,
    /// Session the memory was captured in.
    pub session_id: String,
    /// Owning user.
    pub user_id: String,
    /// Remembered content.
    pub content: String,
    /// Optional embedding vector, filled by the external embedding service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    /// Retention tier.
    #[serde(default)]
    pub priority: MemoryPriority,
    /// Business classification.
    #[serde(default)]
    pub biz_type: BizType,
    /// Arbitrary metadata.
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
}

impl Memory {
    /// Create a memory record, deriving `biz_type` from the content when it
    /// matches the todo pattern.
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
        priority: MemoryPriority,
    ) -> Self {
        let content = content.into();
        let biz_type = if is_todo_content(&content) {
            BizType::Todo
        } else {
            BizType::General
        };
        Self {
            id: ids::new_memory_id(),
            session_id: session_id.into(),
            user_id: user_id.into(),
            content,
            vector: None,
            priority,
            biz_type,
            metadata: serde_json::Map::new(),
            timestamp: Utc::now(),
        }
    }
}
