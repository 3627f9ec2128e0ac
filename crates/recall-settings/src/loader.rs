//! Environment layer.
//!
//! Every override is an enumerated variable; unknown values log a warning
//! and keep the default rather than failing startup.

use std::time::Duration;

use crate::errors::SettingsError;
use crate::types::Settings;

/// Parse a duration accepting `90s`, `30m`, `2h`, or plain seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, SettingsError> {
    let raw = raw.trim();
    let err = |message: String| SettingsError::InvalidValue {
        variable: "duration",
        message,
    };
    if raw.is_empty() {
        return Err(err("empty duration".into()));
    }
    let (digits, unit) = match raw.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => raw.split_at(idx),
        None => (raw, ""),
    };
    let value: u64 = digits
        .parse()
        .map_err(|e| err(format!("bad number in {raw:?}: {e}")))?;
    let secs = match unit.trim() {
        "" | "s" | "sec" | "secs" => value,
        "m" | "min" | "mins" => value * 60,
        "h" | "hr" | "hrs" => value * 3600,
        other => return Err(err(format!("unknown unit {other:?}"))),
    };
    Ok(Duration::from_secs(secs))
}

fn env_var(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn apply_duration(target: &mut Duration, name: &'static str) {
    if let Some(raw) = env_var(name) {
        match parse_duration(&raw) {
            Ok(d) => *target = d,
            Err(e) => tracing::warn!(variable = name, error = %e, "ignoring unparsable duration"),
        }
    }
}

fn apply_port(target: &mut u16, name: &'static str) {
    if let Some(raw) = env_var(name) {
        match raw.parse() {
            Ok(p) => *target = p,
            Err(e) => tracing::warn!(variable = name, error = %e, "ignoring unparsable port"),
        }
    }
}

fn apply_string(target: &mut String, name: &'static str) {
    if let Some(v) = env_var(name) {
        *target = v;
    }
}

fn apply_list(target: &mut Vec<String>, name: &'static str) {
    if let Some(raw) = env_var(name) {
        *target = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
}

/// Build settings from compiled defaults plus environment overrides.
#[must_use]
pub fn load_settings() -> Settings {
    let mut s = Settings::default();

    // Listeners. PORT is the legacy alias for the HTTP listener.
    apply_string(&mut s.server.host, "HOST");
    apply_port(&mut s.server.http_port, "PORT");
    apply_port(&mut s.server.http_port, "HTTP_SERVER_PORT");
    apply_port(&mut s.server.ws_port, "WEBSOCKET_SERVER_PORT");

    // Session lifecycle.
    apply_duration(&mut s.session.timeout, "SESSION_TIMEOUT");
    apply_duration(&mut s.session.cleanup_interval, "CLEANUP_INTERVAL");

    // Storage backends.
    if let Some(dir) = env_var("RECALL_DATA_DIR") {
        s.storage.data_dir = dir.into();
    }
    apply_string(&mut s.storage.vector_store_type, "VECTOR_STORE_TYPE");
    apply_string(&mut s.storage.user_repository_type, "USER_REPOSITORY_TYPE");

    // Vector tuning.
    apply_string(&mut s.vector.embedding_api_url, "EMBEDDING_API_URL");
    apply_string(&mut s.vector.embedding_api_key, "EMBEDDING_API_KEY");
    apply_string(&mut s.vector.db_url, "VECTOR_DB_URL");
    apply_string(&mut s.vector.db_key, "VECTOR_DB_KEY");
    apply_string(&mut s.vector.collection, "VECTOR_DB_COLLECTION");
    if let Some(raw) = env_var("VECTOR_DB_DIMENSION") {
        match raw.parse() {
            Ok(d) => s.vector.dimension = d,
            Err(e) => {
                tracing::warn!(variable = "VECTOR_DB_DIMENSION", error = %e, "ignoring unparsable dimension");
            }
        }
    }
    apply_string(&mut s.vector.metric, "VECTOR_DB_METRIC");
    if let Some(raw) = env_var("SIMILARITY_THRESHOLD") {
        match raw.parse::<f64>() {
            Ok(t) if (0.0..=1.0).contains(&t) => s.vector.similarity_threshold = t,
            Ok(t) => {
                tracing::warn!(variable = "SIMILARITY_THRESHOLD", value = t, "threshold outside [0,1], keeping default");
            }
            Err(e) => {
                tracing::warn!(variable = "SIMILARITY_THRESHOLD", error = %e, "ignoring unparsable threshold");
            }
        }
    }

    // Completion service.
    apply_string(&mut s.llm.provider, "MULTI_DIM_LLM_PROVIDER");
    apply_string(&mut s.llm.model, "MULTI_DIM_LLM_MODEL");

    // Injection scope.
    apply_list(&mut s.intercept.http_path_prefixes, "INTERCEPT_HTTP_PATH_PREFIXES");
    apply_list(&mut s.intercept.http_methods, "INTERCEPT_HTTP_METHODS");
    apply_list(&mut s.intercept.mcp_tools, "INTERCEPT_MCP_TOOLS");

    s
}
