//! Result types for the three retrieval dimensions.
//!
//! Every item a retrieval adapter returns must carry a non-empty id and
//! scores inside `[0, 1]`; [`validate`](TimelineEvent::validate) methods
//! enforce this before results enter the fan-in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::RecallError;

fn check_score(label: &str, value: f64) -> Result<(), RecallError> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(RecallError::InvalidArgument(format!(
            "{label} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

fn check_id(label: &str, id: &str) -> Result<(), RecallError> {
    if id.trim().is_empty() {
        return Err(RecallError::InvalidArgument(format!("{label} id is empty")));
    }
    Ok(())
}

/// One event on the session timeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// Unique event id.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Session the event belongs to.
    pub session_id: String,
    /// Workspace fingerprint.
    pub workspace_id: String,
    /// Event time.
    pub timestamp: DateTime<Utc>,
    /// Event duration in seconds, when meaningful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Event classification (`edit`, `conversation`, `build`, …).
    pub event_type: String,
    /// Short event title.
    pub title: String,
    /// Event body.
    #[serde(default)]
    pub content: String,
    /// Condensed body, when the ingest side produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Files involved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_files: Vec<String>,
    /// Concepts involved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_concepts: Vec<String>,
    /// Parent event for nested activities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<String>,
    /// Captured intent, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Extracted keywords.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Extracted entities.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
    /// Assigned categories.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    /// Importance in `[0, 1]`.
    #[serde(default)]
    pub importance_score: f64,
    /// Relevance to the query in `[0, 1]`.
    #[serde(default)]
    pub relevance_score: f64,
}

impl TimelineEvent {
    /// Reject out-of-range scores and empty identity fields.
    pub fn validate(&self) -> Result<(), RecallError> {
        check_id("timeline event", &self.id)?;
        check_score("importanceScore", self.importance_score)?;
        check_score("relevanceScore", self.relevance_score)?;
        Ok(())
    }

    /// Dedup key: id, falling back to `title|timestamp` for adapters that
    /// return unkeyed rows.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        if self.id.is_empty() {
            format!("{}|{}", self.title, self.timestamp.timestamp_millis())
        } else {
            self.id.clone()
        }
    }
}

/// One node of the knowledge graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeNode {
    /// Unique node id.
    pub id: String,
    /// Graph labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Display name.
    pub name: String,
    /// Node type (`concept`, `component`, `person`, …); never empty.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Grouping category.
    #[serde(default)]
    pub category: String,
    /// Associated keywords.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Vendor-neutral extra properties.
    #[serde(default)]
    pub properties: serde_json::Map<String, Value>,
    /// Query-relevance score in `[0, 1]`.
    #[serde(default)]
    pub score: f64,
    /// Graph importance in `[0, 1]`.
    #[serde(default)]
    pub importance: f64,
    /// Extraction confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
    /// Owning user.
    #[serde(default)]
    pub user_id: String,
    /// Workspace fingerprint.
    #[serde(default)]
    pub workspace_id: String,
    /// Creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl KnowledgeNode {
    /// Reject out-of-range scores, empty ids, and empty types.
    pub fn validate(&self) -> Result<(), RecallError> {
        check_id("knowledge node", &self.id)?;
        if self.node_type.trim().is_empty() {
            return Err(RecallError::InvalidArgument(
                "knowledge node type is empty".into(),
            ));
        }
        check_score("score", self.score)?;
        check_score("importance", self.importance)?;
        check_score("confidence", self.confidence)?;
        Ok(())
    }

    /// Dedup key: id, falling back to the node name.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        if self.id.is_empty() {
            self.name.clone()
        } else {
            self.id.clone()
        }
    }
}

/// One directed edge of the knowledge graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeEdge {
    /// Unique edge id.
    pub id: String,
    /// Source node id.
    pub source_id: String,
    /// Target node id.
    pub target_id: String,
    /// Relationship type; never empty.
    #[serde(rename = "type")]
    pub edge_type: String,
    /// Edge weight in `[0, 1]`.
    #[serde(default)]
    pub weight: f64,
    /// Relationship strength in `[0, 1]`.
    #[serde(default)]
    pub strength: f64,
    /// Longer description.
    #[serde(default)]
    pub description: String,
    /// Vendor-neutral extra properties.
    #[serde(default)]
    pub properties: serde_json::Map<String, Value>,
}

impl KnowledgeEdge {
    /// Reject out-of-range weights, empty ids, and empty types.
    pub fn validate(&self) -> Result<(), RecallError> {
        check_id("knowledge edge", &self.id)?;
        check_id("knowledge edge source", &self.source_id)?;
        check_id("knowledge edge target", &self.target_id)?;
        if self.edge_type.trim().is_empty() {
            return Err(RecallError::InvalidArgument(
                "knowledge edge type is empty".into(),
            ));
        }
        check_score("weight", self.weight)?;
        check_score("strength", self.strength)?;
        Ok(())
    }
}

/// One semantic-similarity match from the vector store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorMatch {
    /// Unique match id.
    pub id: String,
    /// Similarity score in `[0, 1]`.
    pub score: f64,
    /// Raw vector distance, when the backend reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// Document title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Document body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Condensed body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Extracted keywords.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Vendor-neutral extra metadata.
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    /// Owning user, when the document is user-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Workspace fingerprint, when workspace-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    /// Origin of the document (`conversation`, `memory`, `code`, …).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    /// Document time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl VectorMatch {
    /// Reject out-of-range scores and empty ids.
    pub fn validate(&self) -> Result<(), RecallError> {
        check_id("vector match", &self.id)?;
        check_score("score", self.score)?;
        Ok(())
    }

    /// Dedup key: id, falling back to the first 100 content chars.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        if self.id.is_empty() {
            let content = self.content.as_deref().unwrap_or_default();
            crate::text::truncate_str(content, 100).to_owned()
        } else {
            self.id.clone()
        }
    }
}
