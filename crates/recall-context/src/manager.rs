//! Unified context manager.
//!
//! Per-session registry of [`UnifiedContext`] snapshots plus the
//! convenience pipeline that runs intent analysis, wide recall and
//! synthesis, persists the merged snapshot, and reports the outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use recall_core::context::{
    ArchitectureInfo, CompletionStatus, ProjectContext, ProjectPhase, TechStackItem,
    UnifiedContext, clamp_score,
};
use recall_core::errors::{RecallError, Result};
use recall_core::text::strip_code_fences;
use recall_retrieval::{IntentAnalyzer, WideRecallRetriever};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::synthesis::{ContextReply, SynthesisEngine};

/// One `update_context` request.
#[derive(Clone, Debug)]
pub struct ContextUpdateRequest {
    /// Target session.
    pub session_id: String,
    /// Owning user.
    pub user_id: String,
    /// Workspace fingerprint.
    pub workspace_id: String,
    /// Raw user utterance.
    pub query: String,
    /// Outer request deadline.
    pub deadline: Option<Instant>,
}

/// What `update_context` reports back.
#[derive(Clone, Debug)]
pub struct ContextUpdateOutcome {
    /// Confidence of the applied update, `[0, 1]`.
    pub confidence_level: f64,
    /// One-line summary of what changed.
    pub update_summary: String,
    /// Wall-clock of the whole pipeline.
    pub processing_time: Duration,
    /// The user-facing reply strings.
    pub reply: ContextReply,
}

// Wire shape of the project-analysis completion (snake_case per prompt).
#[derive(Debug, Default, Deserialize)]
struct RawTechStackItem {
    #[serde(default)]
    name: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    importance: f64,
}

#[derive(Debug, Default, Deserialize)]
struct RawArchitecture {
    #[serde(default)]
    pattern: String,
    #[serde(default)]
    layers: Vec<String>,
    #[serde(default)]
    components: Vec<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawCompletionStatus {
    #[serde(default)]
    overall_progress: f64,
}

#[derive(Debug, Deserialize)]
struct RawProjectAnalysis {
    #[serde(default)]
    project_name: String,
    #[serde(default)]
    project_path: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    primary_language: String,
    #[serde(default)]
    tech_stack: Vec<RawTechStackItem>,
    #[serde(default)]
    architecture: RawArchitecture,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    main_components: Vec<String>,
    #[serde(default)]
    key_features: Vec<String>,
    #[serde(default)]
    current_phase: String,
    #[serde(default)]
    completion_status: RawCompletionStatus,
    #[serde(default)]
    confidence_level: f64,
}

/// Per-session unified context registry and pipeline driver.
pub struct UnifiedContextManager {
    entries: DashMap<String, UnifiedContext>,
    analyzer: IntentAnalyzer,
    retriever: Arc<WideRecallRetriever>,
    engine: SynthesisEngine,
    intent_timeout: Duration,
}

impl UnifiedContextManager {
    /// Manager wired to the analyzer, retriever and engine.
    #[must_use]
    pub fn new(
        analyzer: IntentAnalyzer,
        retriever: Arc<WideRecallRetriever>,
        engine: SynthesisEngine,
        intent_timeout: Duration,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            analyzer,
            retriever,
            engine,
            intent_timeout,
        }
    }

    /// Current snapshot for a session.
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<UnifiedContext> {
        self.entries.get(session_id).map(|e| e.value().clone())
    }

    /// Merge a newer snapshot into the registry. `created_at` of an
    /// existing entry is preserved; `updated_at` is stamped now.
    pub fn update_memory(&self, session_id: &str, incoming: UnifiedContext) {
        let mut entry = self
            .entries
            .entry(session_id.to_owned())
            .or_insert_with(|| {
                UnifiedContext::new(
                    incoming.session_id.clone(),
                    incoming.user_id.clone(),
                    incoming.workspace_id.clone(),
                )
            });
        entry.value_mut().merge_update(incoming);
    }

    /// True when the session has no usable project analysis: no context,
    /// no project, or a project missing its name or description.
    #[must_use]
    pub fn needs_project_analysis(&self, session_id: &str) -> bool {
        self.entries
            .get(session_id)
            .is_none_or(|entry| {
                entry
                    .value()
                    .project
                    .as_ref()
                    .is_none_or(|p| !p.is_analyzed())
            })
    }

    /// Create the session's [`ProjectContext`] from a project-analysis
    /// payload. Runs **before** retrieval so the synthesis prompt has a
    /// valid project baseline.
    #[instrument(skip(self, payload), fields(session_id))]
    pub fn bootstrap_project(
        &self,
        session_id: &str,
        user_id: &str,
        workspace_id: &str,
        payload: &str,
    ) -> Result<ProjectContext> {
        let parsed: RawProjectAnalysis = serde_json::from_str(strip_code_fences(payload))
            .map_err(|e| RecallError::LlmMalformed(format!("project analysis unparsable: {e}")))?;
        if parsed.project_name.trim().is_empty() {
            return Err(RecallError::InvalidArgument(
                "project analysis has no project_name".into(),
            ));
        }

        let (confidence_level, _) = clamp_score(parsed.confidence_level);
        let (overall_progress, _) = clamp_score(parsed.completion_status.overall_progress);
        let project = ProjectContext {
            project_name: parsed.project_name,
            project_path: parsed.project_path,
            description: parsed.description,
            primary_language: parsed.primary_language,
            tech_stack: parsed
                .tech_stack
                .into_iter()
                .map(|t| TechStackItem {
                    name: t.name,
                    kind: t.kind,
                    version: t.version,
                    importance: clamp_score(t.importance).0,
                })
                .collect(),
            architecture: ArchitectureInfo {
                pattern: parsed.architecture.pattern,
                layers: parsed.architecture.layers,
                components: parsed.architecture.components,
                description: parsed.architecture.description,
            },
            dependencies: parsed.dependencies,
            main_components: parsed.main_components,
            key_features: parsed.key_features,
            current_phase: serde_json::from_value(Value::String(
                parsed.current_phase.trim().to_lowercase(),
            ))
            .unwrap_or(ProjectPhase::Development),
            completion_status: CompletionStatus { overall_progress },
            last_analyzed: Some(Utc::now()),
            confidence_level,
        };

        let mut snapshot = UnifiedContext::new(session_id, user_id, workspace_id);
        snapshot.project = Some(project.clone());
        self.update_memory(session_id, snapshot);
        info!(session_id, project = %project.project_name, "project context bootstrapped");
        Ok(project)
    }

    /// Run the full pipeline for one query: intent analysis → wide recall
    /// → synthesis → persist (when synthesis says so) → outcome.
    pub async fn update_context(&self, req: &ContextUpdateRequest) -> ContextUpdateOutcome {
        let started = Instant::now();

        let analysis = self
            .analyzer
            .analyze(
                &req.query,
                &req.user_id,
                &req.workspace_id,
                self.intent_timeout,
            )
            .await;

        let results = self.retriever.retrieve(&analysis.queries, req.deadline).await;

        let project = self
            .get(&req.session_id)
            .and_then(|ctx| ctx.project);
        let outcome = self
            .engine
            .synthesize(
                &req.query,
                &req.session_id,
                &req.user_id,
                &req.workspace_id,
                project.as_ref(),
                &results,
            )
            .await;

        let update_summary = if outcome.should_update {
            self.update_memory(&req.session_id, outcome.context.clone());
            outcome
                .context
                .current_topic
                .as_ref()
                .map_or_else(
                    || "context refreshed from project baseline".to_owned(),
                    |t| format!("topic updated: {}", t.main_topic),
                )
        } else {
            "no update applied".to_owned()
        };

        debug!(
            session_id = %req.session_id,
            retrieval_quality = results.overall_quality,
            total_results = results.total_results,
            should_update = outcome.should_update,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "context update pipeline finished"
        );

        ContextUpdateOutcome {
            confidence_level: outcome.update_confidence,
            update_summary,
            processing_time: started.elapsed(),
            reply: outcome.reply,
        }
    }
}
