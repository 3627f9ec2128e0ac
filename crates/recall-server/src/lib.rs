//! # recall-server
//!
//! The serving surface of the recall memory service:
//!
//! - **RPC**: JSON-RPC-like envelope over HTTP (`initialize`, `tools/list`,
//!   `tools/call`), a tool registry built at startup, and pre-dispatch
//!   context injection that binds `(user, workspace, session)` into the
//!   request
//! - **Push**: the local-instruction channel — per-user and per-session
//!   connection registries, bounded acknowledgement waits, best-effort
//!   delivery
//! - **WebSocket**: the socket surface feeding the push registries, with
//!   auto-created sessions and heartbeat frames
//! - **Init dialog**: the user-initialization micro state machine with its
//!   process-wide cached user id

#![deny(unsafe_code)]

pub mod http;
pub mod init_dialog;
pub mod metrics;
pub mod push;
pub mod rpc;
pub mod state;
pub mod websocket;

pub use http::router;
pub use state::ServerState;
