//! # recall-core
//!
//! Foundation types, errors, and utilities for the recall memory service.
//!
//! This crate provides the shared vocabulary that all other recall crates
//! depend on:
//!
//! - **Errors**: [`errors::RecallError`] hierarchy via `thiserror`
//! - **IDs**: [`ids`] prefixed UUID-v7 constructors (`sess_`, `mem_`, `cb_`)
//! - **Workspace identity**: [`workspace::workspace_hash`] and path cleaning
//! - **Sessions**: [`session::Session`] with code context and edit history
//! - **Memories**: [`memory::Memory`] with priority tiers and todo detection
//! - **Retrieval results**: [`retrieval::TimelineEvent`],
//!   [`retrieval::KnowledgeNode`], [`retrieval::VectorMatch`]
//! - **Unified context**: [`context::UnifiedContext`] with topic and project
//!   snapshots
//! - **Local instructions**: [`instruction::LocalInstruction`] persistence
//!   directives pushed to clients
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other recall crates.

#![deny(unsafe_code)]

pub mod context;
pub mod errors;
pub mod ids;
pub mod instruction;
pub mod memory;
pub mod retrieval;
pub mod session;
pub mod text;
pub mod user;
pub mod workspace;
