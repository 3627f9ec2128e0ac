//! Uniform `search_by_query` contracts over the three backends.
//!
//! Adapters honor the caller's deadline (the retriever wraps every call in
//! a dimension-level timeout), never panic on any input, and return only
//! validated items — `score ∈ [0, 1]`, non-empty ids.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recall_core::errors::Result;
use recall_core::retrieval::{KnowledgeNode, TimelineEvent, VectorMatch};

/// Inclusive time window for timeline searches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    /// Window start.
    pub start: DateTime<Utc>,
    /// Window end.
    pub end: DateTime<Utc>,
}

/// Parameters of one timeline search.
#[derive(Clone, Debug)]
pub struct TimelineQuery<'a> {
    /// Query text.
    pub query: &'a str,
    /// Result cap.
    pub limit: usize,
    /// Concepts extracted by intent analysis; backends may boost on them.
    pub key_concepts: &'a [String],
    /// Owning user.
    pub user_id: &'a str,
    /// Workspace fingerprint.
    pub workspace_id: &'a str,
    /// Optional time window.
    pub time_range: Option<TimeRange>,
}

/// Temporal retrieval over the time-series backend.
#[async_trait]
pub trait TimelineSearch: Send + Sync {
    /// Search events matching `params.query`, scored by relevance.
    async fn search_by_query(&self, params: TimelineQuery<'_>) -> Result<Vec<TimelineEvent>>;
}

/// Relational retrieval over the knowledge graph.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    /// Search nodes matching `query`, scored by relevance.
    async fn search_by_query(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeNode>>;
}

/// Semantic retrieval over the vector store.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Search documents similar to `query`, scored by similarity.
    async fn search_by_query(&self, query: &str, limit: usize) -> Result<Vec<VectorMatch>>;
}
