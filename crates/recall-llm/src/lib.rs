//! # recall-llm
//!
//! Completion-client contract and HTTP provider implementations.
//!
//! The rest of the service talks to one trait, [`client::CompletionClient`]:
//! a single-call completion with model selection, temperature, max-tokens,
//! JSON mode and a per-call timeout. Five providers are supported —
//! deepseek, openai, qianwen and local speak the OpenAI-compatible chat
//! wire shape; claude speaks the Anthropic messages shape.
//!
//! Malformed JSON from a `format=json` call is **not** an error at this
//! layer: the raw content is returned and the caller parses, so synthesis
//! can apply its own fallback policy.

#![deny(unsafe_code)]

pub mod client;
pub mod errors;
pub mod provider;

pub use client::{Completion, CompletionClient, CompletionRequest, ResponseFormat};
pub use errors::{LlmError, LlmResult};
pub use provider::{HttpCompletionClient, ProviderConfig, ProviderKind};
