//! Shared server state.
//!
//! One instance is built at startup and shared by the RPC surface, the
//! websocket layer, and the background cleanup task. The dispatcher owns
//! the references; no component owns another's lifetime.

use std::sync::Arc;

use recall_context::UnifiedContextManager;
use recall_llm::CompletionClient;
use recall_settings::Settings;
use recall_store::{MemoryStore, SessionStore, UserStore};

use crate::init_dialog::InitDialogRegistry;
use crate::push::PushChannel;

/// Everything a handler can reach.
pub struct ServerState {
    /// Session records.
    pub sessions: Arc<SessionStore>,
    /// User profiles.
    pub users: Arc<UserStore>,
    /// Memory records.
    pub memories: Arc<MemoryStore>,
    /// Unified context registry and synthesis pipeline.
    pub contexts: Arc<UnifiedContextManager>,
    /// Completion client for summaries.
    pub llm: Arc<dyn CompletionClient>,
    /// Local-instruction push channel.
    pub push: Arc<PushChannel>,
    /// User-init dialog registry (process-wide).
    pub init_dialogs: Arc<InitDialogRegistry>,
    /// Resolved settings snapshot.
    pub settings: Arc<Settings>,
}
