//! Synthesis engine: LLM-driven fusion of wide-recall results into a user
//! reply plus an updated unified context.
//!
//! Two prompt flavors, selected by whether the retrieval fan-in has any
//! payload. Output parsing is defensive: fences are stripped, out-of-range
//! scores are clamped (with a confidence penalty), and an unusable
//! completion degrades to a minimal context that callers treat as
//! "no update".

use std::time::{Duration, Instant};

use recall_core::context::{
    IntentPriority, IntentType, KeyConcept, ProjectContext, TopicCategory, TopicContext,
    UnifiedContext, UserIntent, clamp_score,
};
use recall_core::text::strip_code_fences;
use recall_llm::{CompletionClient, CompletionRequest};
use recall_retrieval::RetrievalResults;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::prompts;

/// Confidence penalty applied when any parsed score needed clamping.
const CLAMP_PENALTY: f64 = 0.2;

/// Sentinel reply strings for the degraded path.
const FALLBACK_SHORT: &str = "上下文合成暂不可用";
const FALLBACK_LONG: &str = "未能生成解决方案，请重试";
const FALLBACK_KNOWLEDGE: &str = "暂无相关知识";

/// The three-dimensional user-facing reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextReply {
    /// Short-term memory: the synthesized user intent.
    pub short_term_memory: String,
    /// Long-term memory: the synthesized solution.
    pub long_term_memory: String,
    /// Merged intent + solution, labeled.
    pub relevant_knowledge: String,
}

impl ContextReply {
    fn from_response(user_intent: &str, solution: &str) -> Self {
        Self {
            short_term_memory: user_intent.to_owned(),
            long_term_memory: solution.to_owned(),
            relevant_knowledge: format!("🎯 意图分析: {user_intent}\n💡 解决方案: {solution}"),
        }
    }

    fn fallback() -> Self {
        Self {
            short_term_memory: FALLBACK_SHORT.to_owned(),
            long_term_memory: FALLBACK_LONG.to_owned(),
            relevant_knowledge: FALLBACK_KNOWLEDGE.to_owned(),
        }
    }
}

/// Result of one synthesis run.
#[derive(Clone, Debug)]
pub struct SynthesisOutcome {
    /// The context snapshot to merge; minimal on the degraded path.
    pub context: UnifiedContext,
    /// User-facing reply strings; sentinels on the degraded path.
    pub reply: ContextReply,
    /// Whether the caller should persist the snapshot.
    pub should_update: bool,
    /// Confidence of the update in `[0, 1]`.
    pub update_confidence: f64,
    /// Wall-clock of the synthesis call.
    pub process_time: Duration,
    /// Tokens the completion consumed.
    pub tokens_used: u64,
}

// ── Wire shapes of the two completions ───────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct RawUserIntent {
    #[serde(default)]
    intent_type: String,
    #[serde(default)]
    intent_description: String,
    #[serde(default)]
    priority: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawKeyConcept {
    #[serde(default)]
    concept_name: String,
    #[serde(default)]
    importance: f64,
}

#[derive(Debug, Default, Deserialize)]
struct RawTopicContext {
    #[serde(default)]
    main_topic: String,
    #[serde(default)]
    topic_category: String,
    #[serde(default)]
    user_intent: RawUserIntent,
    #[serde(default)]
    primary_pain_point: String,
    #[serde(default)]
    expected_outcome: String,
    #[serde(default)]
    key_concepts: Vec<RawKeyConcept>,
    #[serde(default)]
    confidence_level: f64,
}

#[derive(Debug, Default, Deserialize)]
struct RawUserResponse {
    #[serde(default)]
    user_intent: String,
    #[serde(default)]
    solution: String,
}

#[derive(Debug, Deserialize)]
struct RawSynthesis {
    topic_context: RawTopicContext,
    #[serde(default)]
    recent_changes_summary: String,
    #[serde(default)]
    user_response: RawUserResponse,
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    #[serde(default)]
    should_update: bool,
    #[serde(default)]
    update_confidence: f64,
    #[serde(default)]
    synthesis_result: String,
    #[serde(default)]
    reasoning: String,
}

fn parse_enum<T: serde::de::DeserializeOwned + Default>(label: &str) -> T {
    serde_json::from_value(Value::String(label.trim().to_lowercase())).unwrap_or_default()
}

// ── Engine ───────────────────────────────────────────────────────────────

/// Builds synthesis prompts and parses their results.
pub struct SynthesisEngine {
    llm: std::sync::Arc<dyn CompletionClient>,
    timeout: Duration,
}

impl SynthesisEngine {
    /// Engine over the given completion client with the LLM deadline.
    #[must_use]
    pub fn new(llm: std::sync::Arc<dyn CompletionClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Run synthesis for one query.
    ///
    /// Picks the retrieval-driven prompt when the fan-in has payload and
    /// the project-only fallback otherwise. Never fails: every error path
    /// degrades to the minimal context plus sentinel reply, with
    /// `should_update = false`.
    pub async fn synthesize(
        &self,
        user_query: &str,
        session_id: &str,
        user_id: &str,
        workspace_id: &str,
        project: Option<&ProjectContext>,
        results: &RetrievalResults,
    ) -> SynthesisOutcome {
        let started = Instant::now();
        if results.is_empty() {
            self.project_only(user_query, session_id, user_id, workspace_id, project, started)
                .await
        } else {
            self.retrieval_driven(
                user_query,
                session_id,
                user_id,
                workspace_id,
                project,
                results,
                started,
            )
            .await
        }
    }

    fn minimal_context(
        session_id: &str,
        user_id: &str,
        workspace_id: &str,
        project: Option<&ProjectContext>,
    ) -> UnifiedContext {
        let mut ctx = UnifiedContext::new(session_id, user_id, workspace_id);
        ctx.project = project.cloned();
        ctx
    }

    fn degraded(
        session_id: &str,
        user_id: &str,
        workspace_id: &str,
        project: Option<&ProjectContext>,
        started: Instant,
        tokens_used: u64,
    ) -> SynthesisOutcome {
        SynthesisOutcome {
            context: Self::minimal_context(session_id, user_id, workspace_id, project),
            reply: ContextReply::fallback(),
            should_update: false,
            update_confidence: 0.0,
            process_time: started.elapsed(),
            tokens_used,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn retrieval_driven(
        &self,
        user_query: &str,
        session_id: &str,
        user_id: &str,
        workspace_id: &str,
        project: Option<&ProjectContext>,
        results: &RetrievalResults,
        started: Instant,
    ) -> SynthesisOutcome {
        let prompt = prompts::synthesis_prompt(
            user_query,
            project,
            &results.timeline.items,
            &results.knowledge.items,
            &results.vector.items,
        );
        let request = CompletionRequest::new(prompt).json().with_timeout(self.timeout);

        let completion = match self.llm.complete(request).await {
            Ok(c) => c,
            Err(e) => {
                warn!(session_id, error = %e, "synthesis call failed, degrading");
                return Self::degraded(session_id, user_id, workspace_id, project, started, 0);
            }
        };

        let parsed: RawSynthesis =
            match serde_json::from_str(strip_code_fences(&completion.content)) {
                Ok(p) => p,
                Err(e) => {
                    warn!(session_id, error = %e, "synthesis output unparsable, degrading");
                    return Self::degraded(
                        session_id,
                        user_id,
                        workspace_id,
                        project,
                        started,
                        completion.tokens_used,
                    );
                }
            };

        let mut any_clamped = false;
        let (mut confidence, clamped) = clamp_score(parsed.topic_context.confidence_level);
        any_clamped |= clamped;

        let key_concepts: Vec<KeyConcept> = parsed
            .topic_context
            .key_concepts
            .into_iter()
            .filter(|c| !c.concept_name.trim().is_empty())
            .map(|c| {
                let (importance, clamped) = clamp_score(c.importance);
                any_clamped |= clamped;
                KeyConcept {
                    name: c.concept_name,
                    importance,
                }
            })
            .collect();

        if any_clamped {
            confidence = (confidence - CLAMP_PENALTY).max(0.0);
            warn!(session_id, confidence, "clamped out-of-range synthesis scores");
        }

        let topic = TopicContext {
            main_topic: parsed.topic_context.main_topic,
            topic_category: parse_enum::<TopicCategory>(&parsed.topic_context.topic_category),
            user_intent: UserIntent {
                intent_type: parse_enum::<IntentType>(&parsed.topic_context.user_intent.intent_type),
                description: parsed.topic_context.user_intent.intent_description,
                priority: parse_enum::<IntentPriority>(&parsed.topic_context.user_intent.priority),
            },
            primary_pain_point: parsed.topic_context.primary_pain_point,
            expected_outcome: parsed.topic_context.expected_outcome,
            key_concepts,
            confidence_level: confidence,
            topic_start_time: None,
            last_updated: None,
            update_count: 0,
        };

        let mut context = Self::minimal_context(session_id, user_id, workspace_id, project);
        context.current_topic = Some(topic);
        context.recent_changes_summary = parsed.recent_changes_summary;

        let process_time = started.elapsed();
        debug!(
            session_id,
            tokens_used = completion.tokens_used,
            elapsed_ms = process_time.as_millis() as u64,
            confidence,
            "retrieval-driven synthesis finished"
        );

        SynthesisOutcome {
            context,
            reply: ContextReply::from_response(
                &parsed.user_response.user_intent,
                &parsed.user_response.solution,
            ),
            should_update: true,
            update_confidence: confidence,
            process_time,
            tokens_used: completion.tokens_used,
        }
    }

    async fn project_only(
        &self,
        user_query: &str,
        session_id: &str,
        user_id: &str,
        workspace_id: &str,
        project: Option<&ProjectContext>,
        started: Instant,
    ) -> SynthesisOutcome {
        let prompt = prompts::project_only_prompt(user_query, project);
        let request = CompletionRequest::new(prompt).json().with_timeout(self.timeout);

        let completion = match self.llm.complete(request).await {
            Ok(c) => c,
            Err(e) => {
                warn!(session_id, error = %e, "project-only synthesis call failed, degrading");
                return Self::degraded(session_id, user_id, workspace_id, project, started, 0);
            }
        };

        let parsed: RawEvaluation =
            match serde_json::from_str(strip_code_fences(&completion.content)) {
                Ok(p) => p,
                Err(e) => {
                    warn!(session_id, error = %e, "project-only output unparsable, degrading");
                    return Self::degraded(
                        session_id,
                        user_id,
                        workspace_id,
                        project,
                        started,
                        completion.tokens_used,
                    );
                }
            };

        let (update_confidence, clamped) = clamp_score(parsed.update_confidence);
        let update_confidence = if clamped {
            (update_confidence - CLAMP_PENALTY).max(0.0)
        } else {
            update_confidence
        };

        let process_time = started.elapsed();
        debug!(
            session_id,
            should_update = parsed.should_update,
            update_confidence,
            reasoning = %parsed.reasoning,
            tokens_used = completion.tokens_used,
            elapsed_ms = process_time.as_millis() as u64,
            "project-only synthesis finished"
        );

        let reply = if parsed.synthesis_result.trim().is_empty() {
            ContextReply::fallback()
        } else {
            ContextReply::from_response(user_query, &parsed.synthesis_result)
        };

        SynthesisOutcome {
            context: Self::minimal_context(session_id, user_id, workspace_id, project),
            reply,
            should_update: parsed.should_update,
            update_confidence,
            process_time,
            tokens_used: completion.tokens_used,
        }
    }
}
