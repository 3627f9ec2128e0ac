//! Intent analysis: one LLM call that turns the raw user utterance into a
//! multi-dimensional query plan plus key concepts.
//!
//! Malformed output never fails the request — the analyzer falls back to a
//! single-query plan that echoes the raw utterance into all three
//! dimensions with zero confidence.

use recall_llm::{CompletionClient, CompletionRequest};
use serde::Deserialize;
use tracing::{debug, warn};

use recall_core::text::strip_code_fences;

use crate::retriever::MultiDimensionalQuery;

/// How the plan was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanStatus {
    /// The LLM produced a structured plan.
    Analyzed,
    /// The LLM output was unusable; the raw query was echoed.
    Fallback,
}

/// The analyzer's structured output.
#[derive(Clone, Debug)]
pub struct IntentAnalysis {
    /// One-line statement of the core intent.
    pub core_intent_text: String,
    /// Domain framing of the utterance.
    pub domain_context_text: String,
    /// Scenario framing of the utterance.
    pub scenario_text: String,
    /// Number of distinct intents detected.
    pub intent_count: u32,
    /// Breakdown when more than one intent exists.
    pub multi_intent_breakdown: Vec<String>,
    /// The dispatchable query plan.
    pub queries: MultiDimensionalQuery,
    /// Extracted key concepts.
    pub key_concepts: Vec<String>,
    /// Analyzer confidence in `[0, 1]`.
    pub confidence: f64,
    /// Plan provenance.
    pub status: PlanStatus,
}

#[derive(Debug, Default, Deserialize)]
struct RawQueries {
    #[serde(default)]
    timeline_queries: Vec<String>,
    #[serde(default)]
    knowledge_queries: Vec<String>,
    #[serde(default)]
    vector_queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    core_intent_text: String,
    #[serde(default)]
    domain_context_text: String,
    #[serde(default)]
    scenario_text: String,
    #[serde(default)]
    intent_count: u32,
    #[serde(default)]
    multi_intent_breakdown: Vec<String>,
    #[serde(default)]
    queries: RawQueries,
    #[serde(default)]
    key_concepts: Vec<String>,
    #[serde(default)]
    confidence: f64,
}

/// Produces query plans from user utterances.
pub struct IntentAnalyzer {
    llm: std::sync::Arc<dyn CompletionClient>,
}

impl IntentAnalyzer {
    /// Analyzer over the given completion client.
    #[must_use]
    pub fn new(llm: std::sync::Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    fn prompt(user_query: &str) -> String {
        format!(
            r#"You are the query planner of a programming-context memory service.
Decompose the user's utterance into retrieval queries for three backends:
a timeline of coding activity, a knowledge graph of project concepts, and
a semantic vector index of conversations and memories.

User utterance:
{user_query}

Respond with strict JSON only:
{{
  "core_intent_text": "<one line>",
  "domain_context_text": "<one line>",
  "scenario_text": "<one line>",
  "intent_count": 1,
  "multi_intent_breakdown": [],
  "queries": {{
    "timeline_queries": ["..."],
    "knowledge_queries": ["..."],
    "vector_queries": ["..."]
  }},
  "key_concepts": ["..."],
  "confidence": 0.0
}}"#
        )
    }

    /// Fallback plan: echo the raw query into all three dimensions.
    fn fallback(user_query: &str, user_id: &str, workspace_id: &str) -> IntentAnalysis {
        let raw = user_query.trim().to_owned();
        IntentAnalysis {
            core_intent_text: raw.clone(),
            domain_context_text: String::new(),
            scenario_text: String::new(),
            intent_count: 1,
            multi_intent_breakdown: Vec::new(),
            queries: MultiDimensionalQuery {
                context_queries: Vec::new(),
                timeline_queries: vec![raw.clone()],
                knowledge_queries: vec![raw.clone()],
                vector_queries: vec![raw],
                user_id: user_id.to_owned(),
                workspace_id: workspace_id.to_owned(),
                key_concepts: Vec::new(),
            },
            key_concepts: Vec::new(),
            confidence: 0.0,
            status: PlanStatus::Fallback,
        }
    }

    /// Run intent analysis for one utterance, filling user and workspace
    /// identity from the injected request context.
    pub async fn analyze(
        &self,
        user_query: &str,
        user_id: &str,
        workspace_id: &str,
        timeout: std::time::Duration,
    ) -> IntentAnalysis {
        let request = CompletionRequest::new(Self::prompt(user_query))
            .json()
            .with_timeout(timeout);

        let completion = match self.llm.complete(request).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "intent analysis call failed, using fallback plan");
                return Self::fallback(user_query, user_id, workspace_id);
            }
        };

        let parsed: RawAnalysis =
            match serde_json::from_str(strip_code_fences(&completion.content)) {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "intent analysis output unparsable, using fallback plan");
                    return Self::fallback(user_query, user_id, workspace_id);
                }
            };

        let (confidence, clamped) = recall_core::context::clamp_score(parsed.confidence);
        if clamped {
            warn!(raw = parsed.confidence, "clamped analyzer confidence");
        }
        debug!(
            intent_count = parsed.intent_count,
            key_concepts = parsed.key_concepts.len(),
            confidence,
            tokens_used = completion.tokens_used,
            "intent analysis finished"
        );

        IntentAnalysis {
            core_intent_text: parsed.core_intent_text,
            domain_context_text: parsed.domain_context_text,
            scenario_text: parsed.scenario_text,
            intent_count: parsed.intent_count.max(1),
            multi_intent_breakdown: parsed.multi_intent_breakdown,
            queries: MultiDimensionalQuery {
                context_queries: Vec::new(),
                timeline_queries: parsed.queries.timeline_queries,
                knowledge_queries: parsed.queries.knowledge_queries,
                vector_queries: parsed.queries.vector_queries,
                user_id: user_id.to_owned(),
                workspace_id: workspace_id.to_owned(),
                key_concepts: parsed.key_concepts.clone(),
            },
            key_concepts: parsed.key_concepts,
            confidence,
            status: PlanStatus::Analyzed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recall_llm::{Completion, LlmError, LlmResult};
    use std::sync::Arc;
    use std::time::Duration;

    struct CannedLlm {
        content: String,
        fail: bool,
    }

    #[async_trait]
    impl CompletionClient for CannedLlm {
        async fn complete(&self, _request: CompletionRequest) -> LlmResult<Completion> {
            if self.fail {
                return Err(LlmError::Timeout(Duration::from_secs(60)));
            }
            Ok(Completion {
                content: self.content.clone(),
                tokens_used: 100,
                model: "test-model".into(),
            })
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    fn analyzer(content: &str) -> IntentAnalyzer {
        IntentAnalyzer::new(Arc::new(CannedLlm {
            content: content.into(),
            fail: false,
        }))
    }

    const GOOD: &str = r#"{
        "core_intent_text": "understand retry logic",
        "domain_context_text": "rust backend",
        "scenario_text": "debugging",
        "intent_count": 1,
        "multi_intent_breakdown": [],
        "queries": {
            "timeline_queries": ["recent retry edits"],
            "knowledge_queries": ["retry component"],
            "vector_queries": ["retry backoff discussion"]
        },
        "key_concepts": ["retry", "backoff"],
        "confidence": 0.85
    }"#;

    #[tokio::test]
    async fn structured_output_populates_plan() {
        let analysis = analyzer(GOOD)
            .analyze("how does retry work?", "u1", "ws", Duration::from_secs(5))
            .await;
        assert_eq!(analysis.status, PlanStatus::Analyzed);
        assert_eq!(analysis.queries.timeline_queries, vec!["recent retry edits"]);
        assert_eq!(analysis.queries.user_id, "u1");
        assert_eq!(analysis.queries.workspace_id, "ws");
        assert_eq!(analysis.queries.key_concepts, vec!["retry", "backoff"]);
        assert!((analysis.confidence - 0.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn fenced_output_is_accepted() {
        let fenced = format!("```json\n{GOOD}\n```");
        let analysis = analyzer(&fenced)
            .analyze("how does retry work?", "u1", "ws", Duration::from_secs(5))
            .await;
        assert_eq!(analysis.status, PlanStatus::Analyzed);
    }

    #[tokio::test]
    async fn malformed_output_falls_back_to_echo_plan() {
        let analysis = analyzer("I cannot answer in JSON, sorry.")
            .analyze("how does retry work?", "u1", "ws", Duration::from_secs(5))
            .await;
        assert_eq!(analysis.status, PlanStatus::Fallback);
        assert!((analysis.confidence - 0.0).abs() < f64::EPSILON);
        assert_eq!(analysis.queries.timeline_queries, vec!["how does retry work?"]);
        assert_eq!(analysis.queries.knowledge_queries, vec!["how does retry work?"]);
        assert_eq!(analysis.queries.vector_queries, vec!["how does retry work?"]);
    }

    #[tokio::test]
    async fn llm_failure_falls_back() {
        let analyzer = IntentAnalyzer::new(Arc::new(CannedLlm {
            content: String::new(),
            fail: true,
        }));
        let analysis = analyzer
            .analyze("query", "u1", "ws", Duration::from_secs(5))
            .await;
        assert_eq!(analysis.status, PlanStatus::Fallback);
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_clamped() {
        let inflated = GOOD.replace("0.85", "1.7");
        let analysis = analyzer(&inflated)
            .analyze("q", "u1", "ws", Duration::from_secs(5))
            .await;
        assert!((analysis.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn prompt_carries_the_raw_utterance() {
        let prompt = IntentAnalyzer::prompt("where is the session resolver?");
        assert!(prompt.contains("where is the session resolver?"));
        assert!(prompt.contains("timeline_queries"));
    }
}
