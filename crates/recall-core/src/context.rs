//! Unified context: the authoritative in-memory snapshot of topic, project
//! and code state that drives synthesis.
//!
//! One [`UnifiedContext`] exists per session; its lifetime equals the
//! session's. Field-level merge preserves `created_at` and anything the
//! incoming update leaves unset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Topic classification buckets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicCategory {
    /// Code-level technical work.
    #[default]
    Technical,
    /// Project planning and coordination.
    Project,
    /// Business and product questions.
    Business,
    /// Learning and exploration.
    Learning,
    /// Debugging and incident work.
    Troubleshooting,
}

/// Intent classification buckets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    /// Information request.
    #[default]
    Query,
    /// Direct instruction.
    Command,
    /// Open-ended conversation.
    Conversation,
    /// Asking for analysis.
    Analysis,
    /// Asking to create something.
    Creation,
    /// Asking to change something.
    Modification,
}

/// Priority assigned to a user intent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentPriority {
    /// Needs immediate attention.
    High,
    /// Normal.
    #[default]
    Medium,
    /// Background.
    Low,
}

/// Structured description of what the user wants.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIntent {
    /// Intent bucket.
    pub intent_type: IntentType,
    /// One-line description.
    #[serde(default)]
    pub description: String,
    /// Assigned priority.
    #[serde(default)]
    pub priority: IntentPriority,
}

/// A concept central to the current topic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyConcept {
    /// Concept name.
    pub name: String,
    /// Importance in `[0, 1]`.
    pub importance: f64,
}

/// Snapshot of the conversation's current topic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicContext {
    /// What the conversation is about.
    pub main_topic: String,
    /// Topic bucket.
    #[serde(default)]
    pub topic_category: TopicCategory,
    /// Structured user intent.
    #[serde(default)]
    pub user_intent: UserIntent,
    /// The friction the user is working against.
    #[serde(default)]
    pub primary_pain_point: String,
    /// What a good outcome looks like.
    #[serde(default)]
    pub expected_outcome: String,
    /// Concepts central to the topic.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_concepts: Vec<KeyConcept>,
    /// Synthesis confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence_level: f64,
    /// When this topic began.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_start_time: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// Number of updates applied to this topic.
    #[serde(default)]
    pub update_count: u32,
}

/// One entry of the project's technology stack.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechStackItem {
    /// Technology name.
    pub name: String,
    /// Kind (`language`, `framework`, `database`, …).
    #[serde(default)]
    pub kind: String,
    /// Version, when known.
    #[serde(default)]
    pub version: String,
    /// Importance in `[0, 1]`.
    #[serde(default)]
    pub importance: f64,
}

/// Architecture summary of the project.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureInfo {
    /// Dominant pattern (`layered`, `microservices`, …).
    #[serde(default)]
    pub pattern: String,
    /// Named layers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<String>,
    /// Named components.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

/// Project delivery phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPhase {
    /// Requirements and design.
    Planning,
    /// Active implementation.
    #[default]
    Development,
    /// Verification.
    Testing,
    /// Rollout.
    Deployment,
    /// Steady-state upkeep.
    Maintenance,
}

/// Overall completion estimate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStatus {
    /// Progress in `[0, 1]`.
    pub overall_progress: f64,
}

/// Snapshot of the project the workspace contains.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    /// Project name.
    pub project_name: String,
    /// Workspace root path.
    #[serde(default)]
    pub project_path: String,
    /// What the project does.
    #[serde(default)]
    pub description: String,
    /// Dominant language.
    #[serde(default)]
    pub primary_language: String,
    /// Technology stack.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tech_stack: Vec<TechStackItem>,
    /// Architecture summary.
    #[serde(default)]
    pub architecture: ArchitectureInfo,
    /// External dependencies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Main components.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub main_components: Vec<String>,
    /// Key features.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_features: Vec<String>,
    /// Delivery phase.
    #[serde(default)]
    pub current_phase: ProjectPhase,
    /// Completion estimate.
    #[serde(default)]
    pub completion_status: CompletionStatus,
    /// When the analysis ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_analyzed: Option<DateTime<Utc>>,
    /// Analysis confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence_level: f64,
}

impl ProjectContext {
    /// Whether the analysis is complete enough to skip a re-run.
    ///
    /// Only the name and description gate re-analysis; an empty tech stack
    /// does not re-trigger.
    #[must_use]
    pub fn is_analyzed(&self) -> bool {
        !self.project_name.trim().is_empty() && !self.description.trim().is_empty()
    }
}

/// The per-session unified context snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedContext {
    /// Owning session.
    pub session_id: String,
    /// Owning user.
    pub user_id: String,
    /// Workspace fingerprint.
    pub workspace_id: String,
    /// Current topic, when synthesized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_topic: Option<TopicContext>,
    /// Project analysis, when bootstrapped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectContext>,
    /// One-sentence summary of recent changes.
    #[serde(default)]
    pub recent_changes_summary: String,
    /// Creation time; preserved across merges.
    pub created_at: DateTime<Utc>,
    /// Last merge time.
    pub updated_at: DateTime<Utc>,
}

impl UnifiedContext {
    /// Create an empty context for a session.
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        workspace_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            workspace_id: workspace_id.into(),
            current_topic: None,
            project: None,
            recent_changes_summary: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Field-level merge of a newer snapshot into this one.
    ///
    /// `created_at` is preserved; `updated_at` is stamped now. Fields the
    /// incoming snapshot leaves unset keep their current value.
    pub fn merge_update(&mut self, incoming: UnifiedContext) {
        if let Some(topic) = incoming.current_topic {
            let update_count = self
                .current_topic
                .as_ref()
                .map_or(0, |t| t.update_count)
                .saturating_add(1);
            let topic_start_time = self
                .current_topic
                .as_ref()
                .and_then(|t| t.topic_start_time)
                .or(topic.topic_start_time)
                .or_else(|| Some(Utc::now()));
            self.current_topic = Some(TopicContext {
                update_count,
                topic_start_time,
                last_updated: Some(Utc::now()),
                ..topic
            });
        }
        if let Some(project) = incoming.project {
            self.project = Some(project);
        }
        if !incoming.recent_changes_summary.is_empty() {
            self.recent_changes_summary = incoming.recent_changes_summary;
        }
        self.updated_at = Utc::now();
    }
}

/// Clamp a score into `[0, 1]`, reporting whether clamping happened.
#[must_use]
pub fn clamp_score(value: f64) -> (f64, bool) {
    if value.is_nan() {
        return (0.0, true);
    }
    if value < 0.0 {
        (0.0, true)
    } else if value > 1.0 {
        (1.0, true)
    } else {
        (value, false)
    }
}
