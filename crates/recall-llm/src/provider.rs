//! HTTP completion providers.
//!
//! One client type covers all five providers; [`ProviderKind`] selects the
//! base URL and wire shape. deepseek, openai, qianwen and local speak the
//! OpenAI-compatible `/chat/completions` shape; claude speaks the Anthropic
//! `/v1/messages` shape with `x-api-key` auth.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::client::{Completion, CompletionClient, CompletionRequest, ResponseFormat};
use crate::errors::{LlmError, LlmResult};

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Which completion service to call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// DeepSeek chat completions.
    DeepSeek,
    /// OpenAI chat completions.
    OpenAi,
    /// Anthropic messages.
    Claude,
    /// Alibaba Qianwen (DashScope compatible mode).
    Qianwen,
    /// A local OpenAI-compatible endpoint (ollama, vllm, …).
    Local,
}

impl ProviderKind {
    /// Parse a provider selector string.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "deepseek" => Some(Self::DeepSeek),
            "openai" => Some(Self::OpenAi),
            "claude" | "anthropic" => Some(Self::Claude),
            "qianwen" | "qwen" => Some(Self::Qianwen),
            "local" => Some(Self::Local),
            _ => None,
        }
    }

    /// Default endpoint for the provider.
    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::DeepSeek => "https://api.deepseek.com",
            Self::OpenAi => "https://api.openai.com",
            Self::Claude => "https://api.anthropic.com",
            Self::Qianwen => "https://dashscope.aliyuncs.com/compatible-mode",
            Self::Local => "http://127.0.0.1:11434",
        }
    }

    /// Whether the provider speaks the Anthropic messages shape.
    #[must_use]
    pub fn is_anthropic_shape(self) -> bool {
        matches!(self, Self::Claude)
    }

    /// Whether the provider honors `response_format: json_object`.
    #[must_use]
    pub fn supports_json_mode(self) -> bool {
        !self.is_anthropic_shape()
    }

    /// Completion path on the base URL.
    #[must_use]
    pub fn completion_path(self) -> &'static str {
        if self.is_anthropic_shape() {
            "/v1/messages"
        } else {
            "/v1/chat/completions"
        }
    }
}

/// Provider configuration.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Service selector.
    pub kind: ProviderKind,
    /// Endpoint override; `None` uses the kind's default.
    pub base_url: Option<String>,
    /// API key; optional for `Local`.
    pub api_key: String,
    /// Default model.
    pub model: String,
}

impl ProviderConfig {
    /// Config with the kind's default endpoint.
    #[must_use]
    pub fn new(kind: ProviderKind, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: None,
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Override the endpoint (used by tests and self-hosted gateways).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn endpoint(&self) -> String {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url());
        format!("{}{}", base.trim_end_matches('/'), self.kind.completion_path())
    }
}

/// HTTP-backed [`CompletionClient`].
pub struct HttpCompletionClient {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl HttpCompletionClient {
    /// Create a client with a fresh HTTP pool.
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client sharing an existing HTTP pool.
    #[must_use]
    pub fn with_client(config: ProviderConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn build_headers(&self) -> LlmResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if self.config.kind.is_anthropic_shape() {
            let _ = headers.insert(
                "anthropic-version",
                HeaderValue::from_static(ANTHROPIC_VERSION),
            );
            let _ = headers.insert(
                "x-api-key",
                HeaderValue::from_str(&self.config.api_key)
                    .map_err(|e| LlmError::Auth(format!("invalid api key header: {e}")))?,
            );
        } else if !self.config.api_key.is_empty() {
            let _ = headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                    .map_err(|e| LlmError::Auth(format!("invalid api key header: {e}")))?,
            );
        }
        Ok(headers)
    }

    fn build_body(&self, request: &CompletionRequest, model: &str) -> Value {
        if self.config.kind.is_anthropic_shape() {
            return json!({
                "model": model,
                "max_tokens": request.max_tokens,
                "temperature": request.temperature,
                "messages": [{"role": "user", "content": request.prompt}],
            });
        }
        let mut body = json!({
            "model": model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{"role": "user", "content": request.prompt}],
        });
        if request.format == ResponseFormat::Json && self.config.kind.supports_json_mode() {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    fn parse_body(&self, body: &Value) -> LlmResult<(String, u64)> {
        if self.config.kind.is_anthropic_shape() {
            let content = body["content"]
                .as_array()
                .and_then(|blocks| {
                    blocks
                        .iter()
                        .find(|b| b["type"] == "text")
                        .and_then(|b| b["text"].as_str())
                })
                .ok_or_else(|| LlmError::InvalidResponse("missing content block".into()))?;
            let tokens = body["usage"]["input_tokens"].as_u64().unwrap_or(0)
                + body["usage"]["output_tokens"].as_u64().unwrap_or(0);
            return Ok((content.to_owned(), tokens));
        }
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".into()))?;
        let tokens = body["usage"]["total_tokens"].as_u64().unwrap_or(0);
        Ok((content.to_owned(), tokens))
    }

    async fn send(&self, request: &CompletionRequest) -> LlmResult<Completion> {
        let model = request.model.clone().unwrap_or_else(|| self.config.model.clone());
        let headers = self.build_headers()?;
        let body = self.build_body(request, &model);
        let started = Instant::now();

        let response = self
            .client
            .post(self.config.endpoint())
            .headers(headers)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(request.timeout)
                } else {
                    LlmError::Transient {
                        status: None,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(provider = ?self.config.kind, status = status.as_u16(), "completion request failed");
            return Err(LlmError::Transient {
                status: Some(status.as_u16()),
                message,
            });
        }

        let parsed: Value = response.json().await.map_err(|e| LlmError::Transient {
            status: Some(status.as_u16()),
            message: format!("body read failed: {e}"),
        })?;
        let (content, tokens_used) = self.parse_body(&parsed)?;
        debug!(
            provider = ?self.config.kind,
            model = %model,
            tokens_used,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "completion finished"
        );
        Ok(Completion {
            content,
            tokens_used,
            model,
        })
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> LlmResult<Completion> {
        // The reqwest timeout covers the transfer; the outer timeout also
        // bounds connection setup and retry-free waiting.
        match tokio::time::timeout(request.timeout, self.send(&request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(request.timeout)),
        }
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
