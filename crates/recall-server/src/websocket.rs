//! WebSocket (push) surface.
//!
//! Connect provides `userID` and an optional `workspace`; the server
//! derives `connectionID = <userID>_ws_<workspaceHash>` and auto-creates a
//! session when none is active. An empty workspace falls back to the
//! per-process random identifier — the socket policy, never mixed with the
//! tool-call rejection policy.
//!
//! Frames from the client are `{type:"register"}` (bind a session to the
//! connection) and `{type:"callback"}` (instruction acks). Frames to the
//! client are `{type:"instruction"}` and heartbeats.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use recall_core::errors::Result;
use recall_core::instruction::InstructionAck;
use recall_core::session::Session;
use recall_core::workspace;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::http::AppState;
use crate::push::ClientConnection;
use crate::state::ServerState;

/// Heartbeat cadence.
const HEARTBEAT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

/// Outbound frame buffer per connection.
const FRAME_BUFFER: usize = 64;

/// Connect-time query parameters.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// Connecting user.
    #[serde(rename = "userID", alias = "userId")]
    pub user_id: String,
    /// Optional workspace path.
    #[serde(default)]
    pub workspace: Option<String>,
}

/// Derive the workspace hash under the socket policy: empty input falls
/// back to the per-process random identifier.
pub fn socket_workspace_hash(workspace: Option<&str>) -> Result<String> {
    match workspace.map(str::trim).filter(|w| !w.is_empty()) {
        Some(path) => workspace::workspace_hash(path),
        None => Ok(workspace::process_fallback_workspace().to_owned()),
    }
}

/// `connectionID` derivation: `<userID>_ws_<workspaceHash>`.
#[must_use]
pub fn connection_id(user_id: &str, workspace_hash: &str) -> String {
    format!("{user_id}_ws_{workspace_hash}")
}

/// Auto-create (or reuse) the session backing a socket connection. Socket
/// metadata is a superset of the tool-call shape, adding `connectionID`.
pub fn ensure_socket_session(
    state: &ServerState,
    user_id: &str,
    workspace: Option<&str>,
    workspace_hash: &str,
    conn_id: &str,
) -> Result<Session> {
    let (session, is_new) = state.sessions.get_or_create_active_session_with_workspace(
        user_id,
        workspace_hash,
        state.settings.session.timeout,
    )?;
    if is_new {
        let workspace_path = workspace
            .map(workspace::clean_path)
            .unwrap_or_default();
        let conn_id = conn_id.to_owned();
        let user = user_id.to_owned();
        let hash = workspace_hash.to_owned();
        let session = state.sessions.update_session(&session.id, move |s| {
            let _ = s.metadata.insert("workspacePath".into(), json!(workspace_path));
            let _ = s.metadata.insert("workspaceHash".into(), json!(hash));
            let _ = s.metadata.insert("userID".into(), json!(user));
            let _ = s.metadata.insert("source".into(), json!("socket"));
            let _ = s.metadata.insert("connectionID".into(), json!(conn_id));
        })?;
        info!(session_id = %session.id, "session auto-created for socket connection");
        return Ok(session);
    }
    Ok(session)
}

/// Handle one inbound client frame. Unknown frame types are logged and
/// ignored; the socket stays open.
pub fn handle_client_frame(state: &ServerState, user_id: &str, raw: &str) {
    let Ok(frame) = serde_json::from_str::<Value>(raw) else {
        warn!(user_id, "ignoring unparsable socket frame");
        return;
    };
    let data = frame.get("data").cloned().unwrap_or(Value::Null);
    match frame.get("type").and_then(Value::as_str) {
        Some("register") => {
            let session_id = data
                .get("sessionID")
                .or_else(|| data.get("sessionId"))
                .and_then(Value::as_str);
            let conn_id = data
                .get("connectionID")
                .or_else(|| data.get("connectionId"))
                .and_then(Value::as_str);
            if let (Some(session_id), Some(conn_id)) = (session_id, conn_id) {
                match state.push.bind_session(session_id, conn_id) {
                    Ok(()) => debug!(session_id, conn_id, "session registered to connection"),
                    Err(e) => warn!(session_id, conn_id, error = %e, "session registration failed"),
                }
            } else {
                warn!(user_id, "register frame missing sessionID/connectionID");
            }
        }
        Some("callback") => {
            let callback_id = data
                .get("callbackID")
                .or_else(|| data.get("callbackId"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            if callback_id.is_empty() {
                warn!(user_id, "callback frame missing callbackID");
                return;
            }
            state.push.ack_callback(InstructionAck {
                callback_id,
                success: data.get("success").and_then(Value::as_bool).unwrap_or(false),
                data: data.get("data").cloned(),
                error: data.get("error").and_then(Value::as_str).map(ToOwned::to_owned),
            });
        }
        other => debug!(user_id, frame_type = ?other, "ignoring unknown socket frame"),
    }
}

/// Axum upgrade endpoint.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(app): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| serve_connection(socket, app.state, query))
}

async fn serve_connection(socket: WebSocket, state: Arc<ServerState>, query: ConnectQuery) {
    let workspace_hash = match socket_workspace_hash(query.workspace.as_deref()) {
        Ok(h) => h,
        Err(e) => {
            warn!(user_id = %query.user_id, error = %e, "rejecting socket connection");
            return;
        }
    };
    let conn_id = connection_id(&query.user_id, &workspace_hash);

    let session = match ensure_socket_session(
        &state,
        &query.user_id,
        query.workspace.as_deref(),
        &workspace_hash,
        &conn_id,
    ) {
        Ok(s) => s,
        Err(e) => {
            warn!(user_id = %query.user_id, error = %e, "could not prepare socket session");
            return;
        }
    };

    let (frame_tx, mut frame_rx) = mpsc::channel(FRAME_BUFFER);
    let connection = Arc::new(ClientConnection::new(
        conn_id.clone(),
        query.user_id.clone(),
        frame_tx,
    ));
    connection.bind_session(&session.id);
    state.push.register(Arc::clone(&connection));
    if let Err(e) = state.push.bind_session(&session.id, &conn_id) {
        warn!(conn_id, error = %e, "initial session binding failed");
    }

    let (mut sink, mut stream) = socket.split();
    let hello = json!({
        "type": "connected",
        "data": {"connectionID": conn_id, "sessionID": session.id},
    });
    if sink.send(Message::Text(hello.to_string().into())).await.is_err() {
        state.push.unregister(&conn_id, &query.user_id);
        return;
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            outbound = frame_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if sink.send(Message::Text(frame.as_str().into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = heartbeat.tick() => {
                let frame = json!({
                    "type": "heartbeat",
                    "data": {"timestamp": chrono::Utc::now().to_rfc3339()},
                });
                if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break;
                }
                // Heartbeats keep the bound session alive.
                if let Some(session_id) = connection.session_id() {
                    state.sessions.touch_session(&session_id);
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_frame(&state, &query.user_id, text.as_str());
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(conn_id, error = %e, "socket read error");
                        break;
                    }
                }
            }
        }
    }

    state.push.unregister(&conn_id, &query.user_id);
    debug!(conn_id, "socket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testutil::test_state;
    use recall_core::instruction::{InstructionType, LocalInstruction};

    #[test]
    fn connection_id_shape() {
        assert_eq!(connection_id("u1", "abcd"), "u1_ws_abcd");
    }

    #[test]
    fn socket_hash_uses_fallback_for_empty_workspace() {
        let a = socket_workspace_hash(None).unwrap();
        let b = socket_workspace_hash(Some("  ")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, workspace::process_fallback_workspace());
    }

    #[test]
    fn socket_hash_uses_real_workspace_when_present() {
        let h = socket_workspace_hash(Some("/p/app")).unwrap();
        assert_eq!(h, workspace::workspace_hash("/p/app").unwrap());
    }

    #[test]
    fn socket_session_metadata_is_a_superset() {
        let state = test_state();
        let hash = workspace::workspace_hash("/p/app").unwrap();
        let conn_id = connection_id("u1", &hash);
        let session =
            ensure_socket_session(&state, "u1", Some("/p/app"), &hash, &conn_id).unwrap();
        let meta = &session.metadata;
        assert_eq!(meta["workspacePath"], "/p/app");
        assert_eq!(meta["workspaceHash"], hash.as_str());
        assert_eq!(meta["userID"], "u1");
        assert_eq!(meta["source"], "socket");
        assert_eq!(meta["connectionID"], conn_id.as_str());
    }

    #[test]
    fn socket_session_is_reused_within_window() {
        let state = test_state();
        let hash = workspace::workspace_hash("/p/app").unwrap();
        let conn_id = connection_id("u1", &hash);
        let first = ensure_socket_session(&state, "u1", Some("/p/app"), &hash, &conn_id).unwrap();
        let second = ensure_socket_session(&state, "u1", Some("/p/app"), &hash, &conn_id).unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn register_frame_binds_session_for_push() {
        let state = test_state();
        let (tx, mut rx) = mpsc::channel(8);
        let conn = Arc::new(ClientConnection::new("c1".into(), "u1".into(), tx));
        state.push.register(conn);

        handle_client_frame(
            &state,
            "u1",
            &json!({"type": "register", "data": {"sessionID": "sess_a", "connectionID": "c1"}})
                .to_string(),
        );

        let instruction = LocalInstruction::new(
            InstructionType::CodeContext,
            "t",
            json!({}),
        );
        assert!(state.push.push_to_session("sess_a", "u1", &instruction).is_some());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn callback_frame_delivers_ack() {
        let state = test_state();
        let (tx, _rx) = mpsc::channel(8);
        state
            .push
            .register(Arc::new(ClientConnection::new("c1".into(), "u1".into(), tx)));
        let instruction =
            LocalInstruction::new(InstructionType::ShortMemory, "t", json!({}));
        let ack_rx = state
            .push
            .push_to_session("sess_a", "u1", &instruction)
            .unwrap();

        handle_client_frame(
            &state,
            "u1",
            &json!({
                "type": "callback",
                "data": {"callbackID": instruction.callback_id, "success": true},
            })
            .to_string(),
        );

        let ack = state.push.await_ack(&instruction.callback_id, ack_rx).await.unwrap();
        assert!(ack.success);
    }

    #[test]
    fn garbage_frames_are_ignored() {
        let state = test_state();
        handle_client_frame(&state, "u1", "not json");
        handle_client_frame(&state, "u1", &json!({"type": "mystery"}).to_string());
        handle_client_frame(&state, "u1", &json!({"type": "callback", "data": {}}).to_string());
    }
}
