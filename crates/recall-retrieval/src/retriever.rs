//! Wide-recall retriever: three bounded, independently timing-out
//! retrievals executed concurrently.
//!
//! Each dimension runs under its own deadline derived from the parent
//! request deadline; expiring one dimension never cancels its siblings.
//! Per-query failures degrade a dimension's status instead of failing the
//! request, and an unconfigured backend reports `skipped`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use recall_core::retrieval::{KnowledgeNode, TimelineEvent, VectorMatch};
use serde::Serialize;
use tracing::{debug, warn};

use crate::adapters::{KnowledgeSearch, TimelineQuery, TimelineSearch, VectorSearch};

/// Quality weights per dimension.
const WEIGHT_TIMELINE: f64 = 0.3;
const WEIGHT_KNOWLEDGE: f64 = 0.3;
const WEIGHT_VECTOR: f64 = 0.4;

/// Per-query result cap.
const PER_QUERY_LIMIT: usize = 10;

/// The query plan the intent analyzer produces.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultiDimensionalQuery {
    /// Queries answered from conversation context alone (not dispatched).
    pub context_queries: Vec<String>,
    /// Timeline dimension queries.
    pub timeline_queries: Vec<String>,
    /// Knowledge dimension queries.
    pub knowledge_queries: Vec<String>,
    /// Vector dimension queries.
    pub vector_queries: Vec<String>,
    /// Owning user.
    pub user_id: String,
    /// Workspace fingerprint.
    pub workspace_id: String,
    /// Concepts extracted from the utterance.
    pub key_concepts: Vec<String>,
}

/// Outcome tag of one dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionStatus {
    /// Every query of the dimension completed.
    Success,
    /// Some queries failed but results exist.
    PartialFailure,
    /// Queries failed and nothing came back.
    Failure,
    /// Backend not configured.
    Skipped,
}

/// One dimension's result set.
#[derive(Clone, Debug)]
pub struct DimensionResult<T> {
    /// Deduplicated items, per-query order preserved.
    pub items: Vec<T>,
    /// Item count (mirrors `items.len()` for envelope serialization).
    pub count: usize,
    /// Outcome tag.
    pub status: DimensionStatus,
    /// Wall-clock the dimension consumed.
    pub duration: Duration,
}

impl<T> DimensionResult<T> {
    fn skipped() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            status: DimensionStatus::Skipped,
            duration: Duration::ZERO,
        }
    }
}

/// The fan-in of all three dimensions.
#[derive(Clone, Debug)]
pub struct RetrievalResults {
    /// Temporal dimension.
    pub timeline: DimensionResult<TimelineEvent>,
    /// Relational dimension.
    pub knowledge: DimensionResult<KnowledgeNode>,
    /// Semantic dimension.
    pub vector: DimensionResult<VectorMatch>,
    /// Sum of all dimension counts.
    pub total_results: usize,
    /// Weighted mean of per-dimension base scores, `[0, 1]`.
    pub overall_quality: f64,
    /// Wall-clock of the whole fan-out.
    pub retrieval_time: Duration,
}

impl RetrievalResults {
    /// True when no dimension returned anything (synthesis falls back to
    /// the project-only prompt).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_results == 0
    }
}

/// Parallel retriever over optional backends.
pub struct WideRecallRetriever {
    timeline: Option<Arc<dyn TimelineSearch>>,
    knowledge: Option<Arc<dyn KnowledgeSearch>>,
    vector: Option<Arc<dyn VectorSearch>>,
    dimension_timeout: Duration,
}

impl WideRecallRetriever {
    /// Retriever over the given adapter slots; `None` slots yield
    /// `skipped` dimensions.
    #[must_use]
    pub fn new(
        timeline: Option<Arc<dyn TimelineSearch>>,
        knowledge: Option<Arc<dyn KnowledgeSearch>>,
        vector: Option<Arc<dyn VectorSearch>>,
        dimension_timeout: Duration,
    ) -> Self {
        Self {
            timeline,
            knowledge,
            vector,
            dimension_timeout,
        }
    }

    /// Effective per-dimension budget under an optional outer deadline.
    fn dimension_budget(&self, outer_deadline: Option<Instant>) -> Duration {
        match outer_deadline {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(self.dimension_timeout),
            None => self.dimension_timeout,
        }
    }

    /// Run the fan-out and join all three dimensions.
    pub async fn retrieve(
        &self,
        query: &MultiDimensionalQuery,
        outer_deadline: Option<Instant>,
    ) -> RetrievalResults {
        let started = Instant::now();
        let budget = self.dimension_budget(outer_deadline);

        let (timeline, knowledge, vector) = tokio::join!(
            self.run_timeline(query, budget),
            self.run_knowledge(query, budget),
            self.run_vector(query, budget),
        );

        let total_results = timeline.count + knowledge.count + vector.count;
        let overall_quality = overall_quality(&timeline, &knowledge, &vector);
        let retrieval_time = started.elapsed();
        debug!(
            total_results,
            overall_quality,
            timeline_status = ?timeline.status,
            knowledge_status = ?knowledge.status,
            vector_status = ?vector.status,
            elapsed_ms = retrieval_time.as_millis() as u64,
            "wide recall finished"
        );
        RetrievalResults {
            timeline,
            knowledge,
            vector,
            total_results,
            overall_quality,
            retrieval_time,
        }
    }

    async fn run_timeline(
        &self,
        query: &MultiDimensionalQuery,
        budget: Duration,
    ) -> DimensionResult<TimelineEvent> {
        let Some(adapter) = self.timeline.clone() else {
            return DimensionResult::skipped();
        };
        let started = Instant::now();
        let queries = non_empty(&query.timeline_queries);
        let mut items: Vec<TimelineEvent> = Vec::new();
        let mut had_failure = false;

        let run = tokio::time::timeout(budget, async {
            for q in &queries {
                let params = TimelineQuery {
                    query: q,
                    limit: PER_QUERY_LIMIT,
                    key_concepts: &query.key_concepts,
                    user_id: &query.user_id,
                    workspace_id: &query.workspace_id,
                    time_range: None,
                };
                match adapter.search_by_query(params).await {
                    Ok(batch) => items.extend(validated(batch, "timeline")),
                    Err(e) => {
                        warn!(query = %q, error = %e, "timeline query failed");
                        had_failure = true;
                    }
                }
            }
        })
        .await;
        if run.is_err() {
            warn!(elapsed_ms = started.elapsed().as_millis() as u64, "timeline dimension deadline expired");
            had_failure = true;
        }

        finish_dimension(
            dedup_by(items, TimelineEvent::dedup_key),
            had_failure,
            started.elapsed(),
        )
    }

    async fn run_knowledge(
        &self,
        query: &MultiDimensionalQuery,
        budget: Duration,
    ) -> DimensionResult<KnowledgeNode> {
        let Some(adapter) = self.knowledge.clone() else {
            return DimensionResult::skipped();
        };
        let started = Instant::now();
        let queries = non_empty(&query.knowledge_queries);
        let mut items: Vec<KnowledgeNode> = Vec::new();
        let mut had_failure = false;

        let run = tokio::time::timeout(budget, async {
            for q in &queries {
                match adapter.search_by_query(q, PER_QUERY_LIMIT).await {
                    Ok(batch) => items.extend(validated(batch, "knowledge")),
                    Err(e) => {
                        warn!(query = %q, error = %e, "knowledge query failed");
                        had_failure = true;
                    }
                }
            }
        })
        .await;
        if run.is_err() {
            warn!(elapsed_ms = started.elapsed().as_millis() as u64, "knowledge dimension deadline expired");
            had_failure = true;
        }

        finish_dimension(
            dedup_by(items, KnowledgeNode::dedup_key),
            had_failure,
            started.elapsed(),
        )
    }

    async fn run_vector(
        &self,
        query: &MultiDimensionalQuery,
        budget: Duration,
    ) -> DimensionResult<VectorMatch> {
        let Some(adapter) = self.vector.clone() else {
            return DimensionResult::skipped();
        };
        let started = Instant::now();
        let queries = non_empty(&query.vector_queries);
        let mut items: Vec<VectorMatch> = Vec::new();
        let mut had_failure = false;

        let run = tokio::time::timeout(budget, async {
            for q in &queries {
                match adapter.search_by_query(q, PER_QUERY_LIMIT).await {
                    Ok(batch) => items.extend(validated(batch, "vector")),
                    Err(e) => {
                        warn!(query = %q, error = %e, "vector query failed");
                        had_failure = true;
                    }
                }
            }
        })
        .await;
        if run.is_err() {
            warn!(elapsed_ms = started.elapsed().as_millis() as u64, "vector dimension deadline expired");
            had_failure = true;
        }

        finish_dimension(
            dedup_by(items, VectorMatch::dedup_key),
            had_failure,
            started.elapsed(),
        )
    }
}

/// Queries worth dispatching: empty strings are dropped by the caller.
fn non_empty(queries: &[String]) -> Vec<String> {
    queries
        .iter()
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .map(String::from)
        .collect()
}

/// Drop items that fail validation; adapters must not panic, and the
/// fan-in must never carry out-of-range scores.
fn validated<T: Validated>(batch: Vec<T>, dimension: &'static str) -> Vec<T> {
    batch
        .into_iter()
        .filter(|item| match item.check() {
            Ok(()) => true,
            Err(e) => {
                warn!(dimension, error = %e, "dropping invalid retrieval item");
                false
            }
        })
        .collect()
}

trait Validated {
    fn check(&self) -> recall_core::errors::Result<()>;
}

impl Validated for TimelineEvent {
    fn check(&self) -> recall_core::errors::Result<()> {
        self.validate()
    }
}

impl Validated for KnowledgeNode {
    fn check(&self) -> recall_core::errors::Result<()> {
        self.validate()
    }
}

impl Validated for VectorMatch {
    fn check(&self) -> recall_core::errors::Result<()> {
        self.validate()
    }
}

/// Deduplicate preserving first occurrence (which preserves query order).
fn dedup_by<T>(items: Vec<T>, key: impl Fn(&T) -> String) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}

fn finish_dimension<T>(items: Vec<T>, had_failure: bool, duration: Duration) -> DimensionResult<T> {
    let status = match (had_failure, items.is_empty()) {
        (false, _) => DimensionStatus::Success,
        (true, false) => DimensionStatus::PartialFailure,
        (true, true) => DimensionStatus::Failure,
    };
    let count = items.len();
    DimensionResult {
        items,
        count,
        status,
        duration,
    }
}

fn mean(scores: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = scores.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Weighted mean of per-dimension base scores; a dimension contributes
/// zero weight unless it succeeded with results.
fn overall_quality(
    timeline: &DimensionResult<TimelineEvent>,
    knowledge: &DimensionResult<KnowledgeNode>,
    vector: &DimensionResult<VectorMatch>,
) -> f64 {
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;

    if timeline.status == DimensionStatus::Success && !timeline.items.is_empty() {
        weighted += WEIGHT_TIMELINE * mean(timeline.items.iter().map(|e| e.relevance_score));
        weight_sum += WEIGHT_TIMELINE;
    }
    if knowledge.status == DimensionStatus::Success && !knowledge.items.is_empty() {
        weighted += WEIGHT_KNOWLEDGE * mean(knowledge.items.iter().map(|n| n.score));
        weight_sum += WEIGHT_KNOWLEDGE;
    }
    if vector.status == DimensionStatus::Success && !vector.items.is_empty() {
        weighted += WEIGHT_VECTOR * mean(vector.items.iter().map(|m| m.score));
        weight_sum += WEIGHT_VECTOR;
    }

    if weight_sum == 0.0 { 0.0 } else { weighted / weight_sum }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use recall_core::errors::RecallError;

    use crate::memory_adapters::{MemoryKnowledgeStore, MemoryTimelineStore, MemoryVectorStore};

    struct FailingTimeline;

    #[async_trait]
    impl TimelineSearch for FailingTimeline {
        async fn search_by_query(
            &self,
            _params: TimelineQuery<'_>,
        ) -> recall_core::errors::Result<Vec<TimelineEvent>> {
            Err(RecallError::StoreUnavailable("timeline db down".into()))
        }
    }

    struct SlowVector;

    #[async_trait]
    impl VectorSearch for SlowVector {
        async fn search_by_query(
            &self,
            _query: &str,
            _limit: usize,
        ) -> recall_core::errors::Result<Vec<VectorMatch>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![])
        }
    }

    fn seeded_stores() -> (
        Arc<MemoryTimelineStore>,
        Arc<MemoryKnowledgeStore>,
        Arc<MemoryVectorStore>,
    ) {
        let timeline = Arc::new(MemoryTimelineStore::new());
        timeline.insert(TimelineEvent {
            id: "e1".into(),
            user_id: "u1".into(),
            session_id: "sess_a".into(),
            workspace_id: "ws".into(),
            timestamp: Utc::now(),
            event_type: "edit".into(),
            title: "session store refactor".into(),
            ..TimelineEvent::default()
        });
        let knowledge = Arc::new(MemoryKnowledgeStore::new());
        knowledge.insert(recall_core::retrieval::KnowledgeNode {
            id: "n1".into(),
            name: "session store".into(),
            node_type: "component".into(),
            ..recall_core::retrieval::KnowledgeNode::default()
        });
        let vector = Arc::new(MemoryVectorStore::new());
        vector.insert(VectorMatch {
            id: "v1".into(),
            content: Some("session store sharding notes".into()),
            ..VectorMatch::default()
        });
        (timeline, knowledge, vector)
    }

    fn plan(queries: &str) -> MultiDimensionalQuery {
        MultiDimensionalQuery {
            timeline_queries: vec![queries.into()],
            knowledge_queries: vec![queries.into()],
            vector_queries: vec![queries.into()],
            user_id: "u1".into(),
            workspace_id: "ws".into(),
            ..MultiDimensionalQuery::default()
        }
    }

    #[tokio::test]
    async fn all_dimensions_succeed() {
        let (t, k, v) = seeded_stores();
        let retriever =
            WideRecallRetriever::new(Some(t), Some(k), Some(v), Duration::from_secs(5));
        let results = retriever.retrieve(&plan("session store"), None).await;

        assert_eq!(results.timeline.status, DimensionStatus::Success);
        assert_eq!(results.knowledge.status, DimensionStatus::Success);
        assert_eq!(results.vector.status, DimensionStatus::Success);
        assert_eq!(results.total_results, 3);
        assert!(results.overall_quality > 0.0);
        assert!(results.overall_quality <= 1.0);
    }

    #[tokio::test]
    async fn all_backends_disabled_yields_skipped_and_zero_quality() {
        let retriever = WideRecallRetriever::new(None, None, None, Duration::from_secs(5));
        let results = retriever.retrieve(&plan("anything"), None).await;
        assert_eq!(results.timeline.status, DimensionStatus::Skipped);
        assert_eq!(results.knowledge.status, DimensionStatus::Skipped);
        assert_eq!(results.vector.status, DimensionStatus::Skipped);
        assert_eq!(results.total_results, 0);
        assert!((results.overall_quality - 0.0).abs() < f64::EPSILON);
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn failing_dimension_leaves_siblings_intact() {
        let (_, k, v) = seeded_stores();
        let retriever = WideRecallRetriever::new(
            Some(Arc::new(FailingTimeline)),
            Some(k),
            Some(v),
            Duration::from_secs(5),
        );
        let results = retriever.retrieve(&plan("session store"), None).await;
        assert_eq!(results.timeline.status, DimensionStatus::Failure);
        assert_eq!(results.timeline.count, 0);
        assert_eq!(results.knowledge.status, DimensionStatus::Success);
        assert_eq!(results.vector.status, DimensionStatus::Success);
        assert_eq!(results.total_results, 2);
        // Quality computed from the two surviving dimensions only.
        assert!(results.overall_quality > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_dimension_expires_alone() {
        let (t, k, _) = seeded_stores();
        let retriever = WideRecallRetriever::new(
            Some(t),
            Some(k),
            Some(Arc::new(SlowVector)),
            Duration::from_millis(100),
        );
        let results = retriever.retrieve(&plan("session store"), None).await;
        assert_eq!(results.vector.status, DimensionStatus::Failure);
        assert_eq!(results.timeline.status, DimensionStatus::Success);
        assert_eq!(results.knowledge.status, DimensionStatus::Success);
    }

    #[tokio::test]
    async fn empty_queries_are_dropped() {
        let (t, k, v) = seeded_stores();
        let retriever =
            WideRecallRetriever::new(Some(t), Some(k), Some(v), Duration::from_secs(5));
        let query = MultiDimensionalQuery {
            timeline_queries: vec!["  ".into(), String::new()],
            knowledge_queries: vec![],
            vector_queries: vec!["".into()],
            user_id: "u1".into(),
            workspace_id: "ws".into(),
            ..MultiDimensionalQuery::default()
        };
        let results = retriever.retrieve(&query, None).await;
        // No queries dispatched — dimensions succeed with nothing.
        assert_eq!(results.total_results, 0);
        assert_eq!(results.timeline.status, DimensionStatus::Success);
        assert!((results.overall_quality - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn duplicate_results_across_queries_are_deduped() {
        let (t, k, v) = seeded_stores();
        let retriever =
            WideRecallRetriever::new(Some(t), Some(k), Some(v), Duration::from_secs(5));
        let query = MultiDimensionalQuery {
            timeline_queries: vec!["session store".into(), "store session".into()],
            knowledge_queries: vec!["session store".into()],
            vector_queries: vec!["session store".into()],
            user_id: "u1".into(),
            workspace_id: "ws".into(),
            ..MultiDimensionalQuery::default()
        };
        let results = retriever.retrieve(&query, None).await;
        // Two timeline queries both hit e1; dedup keeps one.
        assert_eq!(results.timeline.count, 1);
    }

    #[tokio::test]
    async fn outer_deadline_clamps_dimension_budget() {
        let retriever = WideRecallRetriever::new(
            None,
            None,
            Some(Arc::new(SlowVector)),
            Duration::from_secs(5),
        );
        let deadline = Instant::now() + Duration::from_millis(50);
        let started = Instant::now();
        let results = retriever.retrieve(&plan("x"), Some(deadline)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(results.vector.status, DimensionStatus::Failure);
    }

    #[test]
    fn dedup_preserves_first_occurrence_order() {
        let items = vec!["a", "b", "a", "c", "b"];
        let out = dedup_by(items, |s| (*s).to_owned());
        assert_eq!(out, vec!["a", "b", "c"]);
    }

    #[test]
    fn quality_weights_only_successful_nonempty_dimensions() {
        let timeline: DimensionResult<TimelineEvent> = DimensionResult {
            items: vec![],
            count: 0,
            status: DimensionStatus::Success,
            duration: Duration::ZERO,
        };
        let knowledge = DimensionResult {
            items: vec![recall_core::retrieval::KnowledgeNode {
                id: "n1".into(),
                name: "x".into(),
                node_type: "concept".into(),
                score: 0.6,
                ..recall_core::retrieval::KnowledgeNode::default()
            }],
            count: 1,
            status: DimensionStatus::Success,
            duration: Duration::ZERO,
        };
        let vector = DimensionResult {
            items: vec![VectorMatch {
                id: "v1".into(),
                score: 0.8,
                ..VectorMatch::default()
            }],
            count: 1,
            status: DimensionStatus::Success,
            duration: Duration::ZERO,
        };
        let q = overall_quality(&timeline, &knowledge, &vector);
        // (0.3*0.6 + 0.4*0.8) / 0.7
        assert!((q - (0.18 + 0.32) / 0.7).abs() < 1e-9);
    }
}
