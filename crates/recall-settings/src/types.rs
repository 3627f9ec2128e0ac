//! Settings tree.
//!
//! One struct per concern; all values have compiled defaults so a bare
//! environment still yields a runnable service.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Listener configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP (RPC) listener port.
    pub http_port: u16,
    /// WebSocket (push) listener port.
    pub ws_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            http_port: 8765,
            ws_port: 8766,
        }
    }
}

/// Session lifecycle configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    /// Active-session reuse window.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Background cleanup cadence.
    #[serde(with = "duration_secs")]
    pub cleanup_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
            cleanup_interval: Duration::from_secs(10 * 60),
        }
    }
}

/// Storage backend selection and data layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    /// Root of the per-user data layout.
    pub data_dir: PathBuf,
    /// Vector store backend selector (`memory`, `disabled`, vendor names).
    pub vector_store_type: String,
    /// User repository backend selector.
    pub user_repository_type: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            vector_store_type: "memory".into(),
            user_repository_type: "file".into(),
        }
    }
}

/// OS app-data directory for the service.
///
/// `~/Library/Application Support/recall` on macOS, `%APPDATA%\recall` on
/// Windows, `$XDG_DATA_HOME/recall` or `~/.local/share/recall` elsewhere.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("recall")
}

/// Vector-side tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSettings {
    /// Embedding service endpoint.
    pub embedding_api_url: String,
    /// Embedding service key.
    pub embedding_api_key: String,
    /// Vector database endpoint.
    pub db_url: String,
    /// Vector database key.
    pub db_key: String,
    /// Collection name.
    pub collection: String,
    /// Embedding dimension.
    pub dimension: u32,
    /// Distance metric (`cosine`, `dot`, `euclidean`).
    pub metric: String,
    /// Minimum similarity for a match to be returned.
    pub similarity_threshold: f64,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            embedding_api_url: String::new(),
            embedding_api_key: String::new(),
            db_url: String::new(),
            db_key: String::new(),
            collection: "recall_context".into(),
            dimension: 1024,
            metric: "cosine".into(),
            similarity_threshold: 0.3,
        }
    }
}

/// Completion-service selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSettings {
    /// Provider selector (`deepseek`, `openai`, `claude`, `qianwen`, `local`).
    pub provider: String,
    /// Model name passed to the provider.
    pub model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "deepseek".into(),
            model: "deepseek-chat".into(),
        }
    }
}

/// Scope of automatic session-context injection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptSettings {
    /// HTTP path prefixes that receive injection.
    pub http_path_prefixes: Vec<String>,
    /// HTTP methods that receive injection.
    pub http_methods: Vec<String>,
    /// Tool names that receive injection; empty means all.
    pub mcp_tools: Vec<String>,
}

/// Deadlines for the request pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutSettings {
    /// Outer request deadline.
    #[serde(with = "duration_secs")]
    pub request: Duration,
    /// Per-retrieval-dimension deadline.
    #[serde(with = "duration_secs")]
    pub retrieval_dimension: Duration,
    /// Completion-call deadline.
    #[serde(with = "duration_secs")]
    pub llm: Duration,
    /// Push-acknowledgement wait.
    #[serde(with = "duration_secs")]
    pub push_ack: Duration,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(120),
            retrieval_dimension: Duration::from_secs(5),
            llm: Duration::from_secs(60),
            push_ack: Duration::from_secs(30),
        }
    }
}

/// The full settings tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Listener configuration.
    pub server: ServerSettings,
    /// Session lifecycle.
    pub session: SessionSettings,
    /// Storage selection and layout.
    pub storage: StorageSettings,
    /// Vector tuning.
    pub vector: VectorSettings,
    /// Completion-service selection.
    pub llm: LlmSettings,
    /// Injection scope.
    pub intercept: InterceptSettings,
    /// Pipeline deadlines.
    pub timeouts: TimeoutSettings,
}

mod duration_secs {
    //! Serialize durations as whole seconds.

    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
