//! In-memory reference adapters.
//!
//! Back the `memory` storage selector and every adapter-level test. Scoring
//! is token overlap between query and item text — deterministic, bounded to
//! `[0, 1]`, and good enough to exercise ranking paths without a vendor.

use async_trait::async_trait;
use parking_lot::RwLock;
use recall_core::errors::Result;
use recall_core::retrieval::{KnowledgeNode, TimelineEvent, VectorMatch};

use crate::adapters::{KnowledgeSearch, TimelineQuery, TimelineSearch, VectorSearch};

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(String::from)
        .collect()
}

/// Share of query tokens found in `haystack`, in `[0, 1]`.
fn overlap_score(query: &str, haystack: &str) -> f64 {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return 0.0;
    }
    let hay = haystack.to_lowercase();
    let hits = query_tokens.iter().filter(|t| hay.contains(*t as &str)).count();
    hits as f64 / query_tokens.len() as f64
}

/// In-memory timeline backend.
#[derive(Default)]
pub struct MemoryTimelineStore {
    events: RwLock<Vec<TimelineEvent>>,
}

impl MemoryTimelineStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest an event.
    pub fn insert(&self, event: TimelineEvent) {
        self.events.write().push(event);
    }
}

#[async_trait]
impl TimelineSearch for MemoryTimelineStore {
    async fn search_by_query(&self, params: TimelineQuery<'_>) -> Result<Vec<TimelineEvent>> {
        let events = self.events.read();
        let mut scored: Vec<TimelineEvent> = events
            .iter()
            .filter(|e| e.user_id == params.user_id && e.workspace_id == params.workspace_id)
            .filter(|e| {
                params.time_range.is_none_or(|r| {
                    e.timestamp >= r.start && e.timestamp <= r.end
                })
            })
            .filter_map(|e| {
                let text = format!("{} {} {}", e.title, e.content, e.keywords.join(" "));
                let mut score = overlap_score(params.query, &text);
                // Key concepts boost, still bounded.
                if params
                    .key_concepts
                    .iter()
                    .any(|c| text.to_lowercase().contains(&c.to_lowercase()))
                {
                    score = (score + 0.2).min(1.0);
                }
                (score > 0.0).then(|| {
                    let mut hit = e.clone();
                    hit.relevance_score = score;
                    hit
                })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(params.limit);
        Ok(scored)
    }
}

/// In-memory knowledge-graph backend.
#[derive(Default)]
pub struct MemoryKnowledgeStore {
    nodes: RwLock<Vec<KnowledgeNode>>,
}

impl MemoryKnowledgeStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest a node.
    pub fn insert(&self, node: KnowledgeNode) {
        self.nodes.write().push(node);
    }
}

#[async_trait]
impl KnowledgeSearch for MemoryKnowledgeStore {
    async fn search_by_query(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeNode>> {
        let nodes = self.nodes.read();
        let mut scored: Vec<KnowledgeNode> = nodes
            .iter()
            .filter_map(|n| {
                let text = format!("{} {} {}", n.name, n.description, n.keywords.join(" "));
                let score = overlap_score(query, &text);
                (score > 0.0).then(|| {
                    let mut hit = n.clone();
                    hit.score = score;
                    hit
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}

/// In-memory vector backend.
#[derive(Default)]
pub struct MemoryVectorStore {
    documents: RwLock<Vec<VectorMatch>>,
}

impl MemoryVectorStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest a document.
    pub fn insert(&self, document: VectorMatch) {
        self.documents.write().push(document);
    }
}

#[async_trait]
impl VectorSearch for MemoryVectorStore {
    async fn search_by_query(&self, query: &str, limit: usize) -> Result<Vec<VectorMatch>> {
        let documents = self.documents.read();
        let mut scored: Vec<VectorMatch> = documents
            .iter()
            .filter_map(|d| {
                let text = format!(
                    "{} {}",
                    d.title.as_deref().unwrap_or_default(),
                    d.content.as_deref().unwrap_or_default()
                );
                let score = overlap_score(query, &text);
                (score > 0.0).then(|| {
                    let mut hit = d.clone();
                    hit.score = score;
                    hit
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(id: &str, title: &str) -> TimelineEvent {
        TimelineEvent {
            id: id.into(),
            user_id: "u1".into(),
            session_id: "sess_a".into(),
            workspace_id: "ws".into(),
            timestamp: Utc::now(),
            event_type: "edit".into(),
            title: title.into(),
            ..TimelineEvent::default()
        }
    }

    fn query<'a>(q: &'a str, concepts: &'a [String]) -> TimelineQuery<'a> {
        TimelineQuery {
            query: q,
            limit: 10,
            key_concepts: concepts,
            user_id: "u1",
            workspace_id: "ws",
            time_range: None,
        }
    }

    #[tokio::test]
    async fn timeline_scopes_by_user_and_workspace() {
        let store = MemoryTimelineStore::new();
        store.insert(event("e1", "refactored retry logic"));
        let mut foreign = event("e2", "refactored retry logic");
        foreign.user_id = "u2".into();
        store.insert(foreign);

        let hits = store.search_by_query(query("retry logic", &[])).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "e1");
    }

    #[tokio::test]
    async fn timeline_scores_bounded_with_concept_boost() {
        let store = MemoryTimelineStore::new();
        store.insert(event("e1", "retry logic refactor"));
        let concepts = vec!["retry".to_owned()];
        let hits = store
            .search_by_query(query("retry logic refactor", &concepts))
            .await
            .unwrap();
        assert!(hits[0].relevance_score > 0.9);
        assert!(hits[0].relevance_score <= 1.0);
    }

    #[tokio::test]
    async fn timeline_time_range_filters() {
        let store = MemoryTimelineStore::new();
        let mut old = event("e1", "retry logic");
        old.timestamp = Utc::now() - chrono::Duration::days(30);
        store.insert(old);
        store.insert(event("e2", "retry logic"));

        let range = crate::adapters::TimeRange {
            start: Utc::now() - chrono::Duration::days(1),
            end: Utc::now() + chrono::Duration::days(1),
        };
        let mut params = query("retry logic", &[]);
        params.time_range = Some(range);
        let hits = store.search_by_query(params).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "e2");
    }

    #[tokio::test]
    async fn knowledge_ranks_by_overlap() {
        let store = MemoryKnowledgeStore::new();
        store.insert(KnowledgeNode {
            id: "n1".into(),
            name: "wide recall retriever".into(),
            node_type: "component".into(),
            ..KnowledgeNode::default()
        });
        store.insert(KnowledgeNode {
            id: "n2".into(),
            name: "push channel".into(),
            node_type: "component".into(),
            ..KnowledgeNode::default()
        });
        let hits = store.search_by_query("wide recall", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "n1");
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test]
    async fn vector_empty_query_returns_nothing() {
        let store = MemoryVectorStore::new();
        store.insert(VectorMatch {
            id: "v1".into(),
            content: Some("retriever internals".into()),
            ..VectorMatch::default()
        });
        let hits = store.search_by_query("", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn vector_limit_respected() {
        let store = MemoryVectorStore::new();
        for i in 0..5 {
            store.insert(VectorMatch {
                id: format!("v{i}"),
                content: Some("session store design".into()),
                ..VectorMatch::default()
            });
        }
        let hits = store.search_by_query("session store", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
    }
}
