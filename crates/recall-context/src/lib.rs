//! # recall-context
//!
//! The synthesis half of the pipeline: per-session unified context
//! registry and the LLM-driven synthesis engine.
//!
//! - [`manager::UnifiedContextManager`]: holds one
//!   [`recall_core::context::UnifiedContext`] per session, merges updates,
//!   drives the "needs project analysis" flag, and runs the full
//!   intent → retrieval → synthesis → persist pipeline
//! - [`synthesis::SynthesisEngine`]: the two-prompt flow — retrieval-driven
//!   synthesis and the project-only fallback — with strict-JSON parsing,
//!   fence stripping, score clamping, and the minimal-context degradation
//!   path
//! - [`prompts`]: the prompt templates, including the project-analysis
//!   bootstrap

#![deny(unsafe_code)]

pub mod manager;
pub mod prompts;
pub mod synthesis;

pub use manager::{ContextUpdateOutcome, UnifiedContextManager};
pub use synthesis::{ContextReply, SynthesisEngine, SynthesisOutcome};
