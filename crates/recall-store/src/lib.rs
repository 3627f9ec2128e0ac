//! # recall-store
//!
//! Keyed stores for sessions, users, and memory records, plus the per-user
//! disk layout and the identity & workspace resolver.
//!
//! - [`session_store::SessionStore`]: sharded by user, insertion-ordered
//!   within a shard, per-session writes serialized behind the shard lock
//! - [`resolver::SessionResolver`]: `(user, workspace)` → unique active
//!   session, with the cross-workspace reuse guard
//! - [`memory_store::MemoryStore`]: memory records with todo filtering
//! - [`user_store::UserStore`]: user profiles and the init gate
//! - [`layout::DataLayout`]: `<data_dir>/users/<id>/…` path arithmetic
//!
//! All stores persist as whole-file JSON writes (write-then-rename); a
//! store constructed without a layout is purely in-memory, which is what
//! unit tests use.

#![deny(unsafe_code)]

pub mod layout;
pub mod memory_store;
pub mod resolver;
pub mod session_store;
pub mod user_store;

pub use layout::DataLayout;
pub use memory_store::{MemoryStore, TodoStatus};
pub use resolver::{ResolvedSession, SessionResolver};
pub use session_store::{SessionFilter, SessionStore};
pub use user_store::UserStore;
