//! Local instructions: persistence directives the server pushes to clients.
//!
//! The server cannot write into the user's local environment, so it asks
//! the client to do it and awaits a bounded acknowledgement keyed by
//! `callback_id`. Instructions are owned by the push channel until acked
//! or timed out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids;

/// What kind of local artifact the client should persist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionType {
    /// User-level configuration.
    UserConfig,
    /// Session snapshot.
    SessionStore,
    /// Short-term memory extract.
    ShortMemory,
    /// Code-context association.
    CodeContext,
    /// User preferences.
    Preferences,
    /// Local cache refresh.
    CacheUpdate,
}

/// Write options for a local instruction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionOptions {
    /// Create parent directories if missing.
    #[serde(default)]
    pub create_dir: bool,
    /// Back up the target before writing.
    #[serde(default)]
    pub backup: bool,
    /// Merge with existing content instead of replacing.
    #[serde(default)]
    pub merge: bool,
    /// Age limit in seconds for cached artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,
    /// Remove stale siblings after writing.
    #[serde(default)]
    pub cleanup_old: bool,
}

/// Delivery priority of an instruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionPriority {
    /// Deliver before normal traffic.
    High,
    /// Normal.
    #[default]
    Normal,
    /// Deliver when idle.
    Low,
}

/// A persistence directive pushed to the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalInstruction {
    /// Artifact kind.
    #[serde(rename = "type")]
    pub instruction_type: InstructionType,
    /// Client-side target path or key.
    pub target: String,
    /// Payload to persist.
    pub content: Value,
    /// Write options.
    #[serde(default)]
    pub options: InstructionOptions,
    /// Acknowledgement correlation id (`cb_…`).
    pub callback_id: String,
    /// Delivery priority.
    #[serde(default)]
    pub priority: InstructionPriority,
}

impl LocalInstruction {
    /// Create an instruction with a fresh callback id.
    #[must_use]
    pub fn new(instruction_type: InstructionType, target: impl Into<String>, content: Value) -> Self {
        Self {
            instruction_type,
            target: target.into(),
            content,
            options: InstructionOptions::default(),
            callback_id: ids::new_callback_id(),
            priority: InstructionPriority::default(),
        }
    }

    /// Builder-style options override.
    #[must_use]
    pub fn with_options(mut self, options: InstructionOptions) -> Self {
        self.options = options;
        self
    }
}

/// Client acknowledgement of a delivered instruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionAck {
    /// Correlation id the client echoes back.
    pub callback_id: String,
    /// Whether the client persisted the artifact.
    pub success: bool,
    /// Optional result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure description when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
