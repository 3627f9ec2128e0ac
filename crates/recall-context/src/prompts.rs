//! Prompt templates.
//!
//! Three templates drive the engine: project-analysis bootstrap,
//! retrieval-driven synthesis, and the project-only fallback. Project
//! sections render the `未分析` placeholder for fields the analysis has not
//! filled; once `needs_project_analysis` is false, no placeholder remains.

use recall_core::context::ProjectContext;
use recall_core::retrieval::{KnowledgeNode, TimelineEvent, VectorMatch};
use recall_core::text::truncate_with_suffix;

/// Placeholder rendered for unanalyzed project fields.
pub const UNANALYZED: &str = "未分析";

/// How many items of each dimension enter the synthesis prompt.
const TOP_N: usize = 3;

/// Vector content budget inside the prompt.
const VECTOR_SNIPPET_BYTES: usize = 200;

/// Project-analysis bootstrap prompt, keyed on workspace root and user.
#[must_use]
pub fn project_analysis_prompt(workspace_root: &str, user_id: &str) -> String {
    format!(
        r#"Analyze the project at the workspace root below and summarize it for a
programming-context memory service. The summary seeds every later context
synthesis for user {user_id}.

Workspace root: {workspace_root}

Respond with strict JSON only:
{{
  "project_name": "<name>",
  "project_path": "{workspace_root}",
  "description": "<what the project does>",
  "primary_language": "<language>",
  "tech_stack": [{{"name": "...", "kind": "...", "version": "", "importance": 0.0}}],
  "architecture": {{"pattern": "...", "layers": [], "components": [], "description": "..."}},
  "dependencies": [],
  "main_components": [],
  "key_features": [],
  "current_phase": "planning|development|testing|deployment|maintenance",
  "completion_status": {{"overall_progress": 0.0}},
  "confidence_level": 0.0
}}"#
    )
}

fn project_section(project: Option<&ProjectContext>) -> String {
    let Some(p) = project else {
        return format!(
            "Project: {UNANALYZED}\nDescription: {UNANALYZED}\nTech stack: {UNANALYZED}\nPhase: {UNANALYZED}"
        );
    };
    let name = if p.project_name.trim().is_empty() {
        UNANALYZED
    } else {
        &p.project_name
    };
    let description = if p.description.trim().is_empty() {
        UNANALYZED
    } else {
        &p.description
    };
    let tech = if p.tech_stack.is_empty() {
        "(none recorded)".to_owned()
    } else {
        p.tech_stack
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let phase = serde_json::to_value(p.current_phase)
        .ok()
        .and_then(|v| v.as_str().map(ToOwned::to_owned))
        .unwrap_or_default();
    format!(
        "Project: {name}\nDescription: {description}\nTech stack: {tech}\nArchitecture: {}\nPhase: {phase}",
        if p.architecture.pattern.is_empty() {
            "(unspecified)"
        } else {
            &p.architecture.pattern
        }
    )
}

/// Retrieval-driven synthesis prompt: top-3 of each dimension plus the
/// project baseline, asking for the strict synthesis JSON.
#[must_use]
pub fn synthesis_prompt(
    user_query: &str,
    project: Option<&ProjectContext>,
    timeline: &[TimelineEvent],
    knowledge: &[KnowledgeNode],
    vector: &[VectorMatch],
) -> String {
    let mut sections = Vec::new();

    let timeline_lines: Vec<String> = timeline
        .iter()
        .take(TOP_N)
        .map(|e| {
            format!(
                "- [{}] {} — {}",
                e.timestamp.to_rfc3339(),
                e.event_type,
                e.title
            )
        })
        .collect();
    sections.push(format!(
        "Recent activity (timeline):\n{}",
        if timeline_lines.is_empty() {
            "(none)".to_owned()
        } else {
            timeline_lines.join("\n")
        }
    ));

    let knowledge_lines: Vec<String> = knowledge
        .iter()
        .take(TOP_N)
        .map(|n| format!("- {} ({}): {}", n.name, n.node_type, n.description))
        .collect();
    sections.push(format!(
        "Related concepts (knowledge graph):\n{}",
        if knowledge_lines.is_empty() {
            "(none)".to_owned()
        } else {
            knowledge_lines.join("\n")
        }
    ));

    let vector_lines: Vec<String> = vector
        .iter()
        .take(TOP_N)
        .map(|m| {
            format!(
                "- (similarity {:.2}) {}",
                m.score,
                truncate_with_suffix(
                    m.content.as_deref().unwrap_or_default(),
                    VECTOR_SNIPPET_BYTES,
                    "…"
                )
            )
        })
        .collect();
    sections.push(format!(
        "Similar context (vector):\n{}",
        if vector_lines.is_empty() {
            "(none)".to_owned()
        } else {
            vector_lines.join("\n")
        }
    ));

    format!(
        r#"You are the context synthesizer of a programming-context memory service.
Fuse the retrieved context below into an updated topic snapshot and an
answer for the user.

{project}

{retrieved}

User query:
{user_query}

Respond with strict JSON only:
{{
  "topic_context": {{
    "main_topic": "...",
    "topic_category": "technical|project|business|learning|troubleshooting",
    "user_intent": {{"intent_type": "query|command|conversation|analysis|creation|modification", "intent_description": "...", "priority": "high|medium|low"}},
    "primary_pain_point": "...",
    "expected_outcome": "...",
    "key_concepts": [{{"concept_name": "...", "importance": 0.0}}],
    "confidence_level": 0.0
  }},
  "recent_changes_summary": "<one sentence or empty>",
  "user_response": {{"user_intent": "...", "solution": "..."}}
}}"#,
        project = project_section(project),
        retrieved = sections.join("\n\n"),
    )
}

/// Project-only fallback prompt, used when every dimension came back empty.
#[must_use]
pub fn project_only_prompt(user_query: &str, project: Option<&ProjectContext>) -> String {
    format!(
        r#"You are the context synthesizer of a programming-context memory service.
No retrieved context is available for this query; judge from the project
baseline alone whether the stored context should be updated, and answer
the user as far as the baseline allows.

{project}

User query:
{user_query}

Respond with strict JSON only:
{{
  "should_update": false,
  "update_confidence": 0.0,
  "synthesis_result": "...",
  "reasoning": "..."
}}"#,
        project = project_section(project),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use recall_core::context::{ProjectPhase, TechStackItem};

    fn analyzed_project() -> ProjectContext {
        ProjectContext {
            project_name: "recall".into(),
            description: "programming-context memory service".into(),
            tech_stack: vec![TechStackItem {
                name: "tokio".into(),
                kind: "runtime".into(),
                ..TechStackItem::default()
            }],
            current_phase: ProjectPhase::Development,
            ..ProjectContext::default()
        }
    }

    #[test]
    fn analyzed_project_renders_without_placeholder() {
        let prompt = synthesis_prompt("q", Some(&analyzed_project()), &[], &[], &[]);
        assert!(!prompt.contains(UNANALYZED));
        assert!(prompt.contains("recall"));
        assert!(prompt.contains("tokio"));
        assert!(prompt.contains("development"));
    }

    #[test]
    fn missing_project_renders_placeholder() {
        let prompt = synthesis_prompt("q", None, &[], &[], &[]);
        assert!(prompt.contains(UNANALYZED));
    }

    #[test]
    fn partially_analyzed_project_renders_placeholder() {
        let mut project = analyzed_project();
        project.description = String::new();
        let prompt = synthesis_prompt("q", Some(&project), &[], &[], &[]);
        assert!(prompt.contains(UNANALYZED));
    }

    #[test]
    fn synthesis_prompt_lists_top_three_only() {
        let events: Vec<TimelineEvent> = (0..5)
            .map(|i| TimelineEvent {
                id: format!("e{i}"),
                user_id: "u1".into(),
                session_id: "s".into(),
                workspace_id: "ws".into(),
                timestamp: Utc::now(),
                event_type: "edit".into(),
                title: format!("edit number {i}"),
                ..TimelineEvent::default()
            })
            .collect();
        let prompt = synthesis_prompt("q", None, &events, &[], &[]);
        assert!(prompt.contains("edit number 0"));
        assert!(prompt.contains("edit number 2"));
        assert!(!prompt.contains("edit number 3"));
    }

    #[test]
    fn vector_content_is_truncated() {
        let long = "a".repeat(500);
        let matches = vec![VectorMatch {
            id: "v1".into(),
            score: 0.9,
            content: Some(long),
            ..VectorMatch::default()
        }];
        let prompt = synthesis_prompt("q", None, &[], &[], &matches);
        assert!(prompt.contains("similarity 0.90"));
        assert!(!prompt.contains(&"a".repeat(300)));
    }

    #[test]
    fn project_analysis_prompt_keys_on_workspace_and_user() {
        let prompt = project_analysis_prompt("/p/app", "u1");
        assert!(prompt.contains("/p/app"));
        assert!(prompt.contains("u1"));
        assert!(prompt.contains("project_name"));
    }

    #[test]
    fn project_only_prompt_carries_evaluation_schema() {
        let prompt = project_only_prompt("q", Some(&analyzed_project()));
        assert!(prompt.contains("should_update"));
        assert!(prompt.contains("update_confidence"));
        assert!(!prompt.contains(UNANALYZED));
    }
}
