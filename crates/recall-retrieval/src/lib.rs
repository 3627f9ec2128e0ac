//! # recall-retrieval
//!
//! The wide-recall half of the pipeline: three uniform `search_by_query`
//! contracts over heterogeneous backends, a parallel retriever with
//! per-dimension deadlines and status tagging, and the LLM-driven intent
//! analyzer that produces the multi-dimensional query plan.
//!
//! Backends are optional: an unconfigured dimension reports `skipped` and
//! never fails the request. A failing dimension degrades alone — its
//! siblings still compose the reply.

#![deny(unsafe_code)]

pub mod adapters;
pub mod intent;
pub mod memory_adapters;
pub mod retriever;

pub use adapters::{
    KnowledgeSearch, TimeRange, TimelineQuery, TimelineSearch, VectorSearch,
};
pub use intent::{IntentAnalysis, IntentAnalyzer, PlanStatus};
pub use memory_adapters::{MemoryKnowledgeStore, MemoryTimelineStore, MemoryVectorStore};
pub use retriever::{
    DimensionResult, DimensionStatus, MultiDimensionalQuery, RetrievalResults, WideRecallRetriever,
};
