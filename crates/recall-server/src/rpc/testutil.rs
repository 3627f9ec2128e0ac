//! Test fixtures for the RPC surface.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use recall_context::{SynthesisEngine, UnifiedContextManager};
use recall_llm::{Completion, CompletionClient, CompletionRequest, LlmResult};
use recall_retrieval::{IntentAnalyzer, MemoryVectorStore, WideRecallRetriever};
use recall_settings::Settings;
use recall_store::{MemoryStore, SessionStore, UserStore};

use crate::init_dialog::InitDialogRegistry;
use crate::push::PushChannel;
use crate::state::ServerState;

/// Answers each prompt family with a fixed, parsable completion.
pub struct ScriptedLlm;

#[async_trait]
impl CompletionClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> LlmResult<Completion> {
        let content = if request.prompt.contains("query planner") {
            r#"{
                "core_intent_text": "test intent",
                "intent_count": 1,
                "queries": {
                    "timeline_queries": [],
                    "knowledge_queries": [],
                    "vector_queries": ["test query"]
                },
                "key_concepts": ["testing"],
                "confidence": 0.9
            }"#
            .to_owned()
        } else if request.prompt.contains("No retrieved context") {
            r#"{"should_update": false, "update_confidence": 0.2, "synthesis_result": "baseline answer", "reasoning": "no fan-in"}"#.to_owned()
        } else if request.prompt.contains("context synthesizer") {
            r#"{
                "topic_context": {
                    "main_topic": "test topic",
                    "topic_category": "technical",
                    "user_intent": {"intent_type": "query", "intent_description": "test", "priority": "medium"},
                    "primary_pain_point": "",
                    "expected_outcome": "",
                    "key_concepts": [],
                    "confidence_level": 0.8
                },
                "recent_changes_summary": "tests were added",
                "user_response": {"user_intent": "test intent", "solution": "test solution"}
            }"#
            .to_owned()
        } else {
            // Conversation summaries and anything else.
            "conversation covered retrieval testing".to_owned()
        };
        Ok(Completion {
            content,
            tokens_used: 7,
            model: "scripted".into(),
        })
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// In-memory server state wired to the scripted LLM. The vector store is
/// returned seeded so retrieval-driven paths have payload.
pub fn test_state_with_vector() -> (ServerState, Arc<MemoryVectorStore>) {
    let llm: Arc<dyn CompletionClient> = Arc::new(ScriptedLlm);
    let vector = Arc::new(MemoryVectorStore::new());
    let retriever = Arc::new(WideRecallRetriever::new(
        None,
        None,
        Some(vector.clone()),
        Duration::from_secs(5),
    ));
    let users = Arc::new(UserStore::in_memory());
    let state = ServerState {
        sessions: Arc::new(SessionStore::in_memory()),
        users: Arc::clone(&users),
        memories: Arc::new(MemoryStore::in_memory()),
        contexts: Arc::new(UnifiedContextManager::new(
            IntentAnalyzer::new(Arc::clone(&llm)),
            retriever,
            SynthesisEngine::new(Arc::clone(&llm), Duration::from_secs(60)),
            Duration::from_secs(5),
        )),
        llm,
        push: Arc::new(PushChannel::new(Duration::from_secs(30))),
        init_dialogs: Arc::new(InitDialogRegistry::new(users)),
        settings: Arc::new(Settings::default()),
    };
    (state, vector)
}

/// In-memory server state wired to the scripted LLM.
pub fn test_state() -> ServerState {
    test_state_with_vector().0
}
