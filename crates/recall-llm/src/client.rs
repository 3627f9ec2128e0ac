//! The completion contract the rest of the service consumes.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::LlmResult;

/// Requested output shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Free-form text.
    #[default]
    Text,
    /// Strict JSON; providers that support it get a response-format hint.
    Json,
}

/// One completion request.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    /// Full prompt text.
    pub prompt: String,
    /// Model override; `None` uses the client's configured model.
    pub model: Option<String>,
    /// Output token cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Requested output shape.
    pub format: ResponseFormat,
    /// Per-call deadline.
    pub timeout: Duration,
    /// Free-form request metadata, logged alongside usage.
    pub metadata: HashMap<String, String>,
}

impl CompletionRequest {
    /// A request with the service's standard knobs.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            max_tokens: 2048,
            temperature: 0.2,
            format: ResponseFormat::Text,
            timeout: Duration::from_secs(60),
            metadata: HashMap::new(),
        }
    }

    /// Ask for strict JSON output.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.format = ResponseFormat::Json;
        self
    }

    /// Override the per-call deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One completion result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    /// Raw content; for `format=json` this may still be non-JSON — the
    /// caller parses and applies its own fallback.
    pub content: String,
    /// Total tokens the provider reported, when it did.
    pub tokens_used: u64,
    /// Model that produced the completion.
    pub model: String,
}

/// Abstract single-call completion interface.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run one completion under the request's deadline.
    async fn complete(&self, request: CompletionRequest) -> LlmResult<Completion>;

    /// Name of the active model, used in log prompts.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_defaults() {
        let req = CompletionRequest::new("analyze this");
        assert_eq!(req.format, ResponseFormat::Text);
        assert_eq!(req.timeout, Duration::from_secs(60));
        assert!(req.model.is_none());
    }

    #[test]
    fn json_builder_sets_format() {
        let req = CompletionRequest::new("x").json().with_timeout(Duration::from_secs(5));
        assert_eq!(req.format, ResponseFormat::Json);
        assert_eq!(req.timeout, Duration::from_secs(5));
    }
}
