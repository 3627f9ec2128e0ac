//! Local-instruction push channel.
//!
//! Maintains `(user → [connection])` and `(session → connection)` mappings
//! populated by the socket layer. Pushes are best-effort: absence of an
//! online client is logged, never an error. Acknowledgement waits are
//! bounded; a late ack after the wait expired is accepted silently.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use metrics::counter;
use parking_lot::RwLock;
use recall_core::errors::{RecallError, Result};
use recall_core::instruction::{InstructionAck, LocalInstruction};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// One connected client.
pub struct ClientConnection {
    /// Connection id (`<user>_ws_<workspaceHash>`).
    pub id: String,
    /// Owning user.
    pub user_id: String,
    sender: mpsc::Sender<Arc<String>>,
    session_id: RwLock<Option<String>>,
}

impl ClientConnection {
    /// New connection over an outbound frame channel.
    #[must_use]
    pub fn new(id: String, user_id: String, sender: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            user_id,
            sender,
            session_id: RwLock::new(None),
        }
    }

    /// Bind this connection to a session.
    pub fn bind_session(&self, session_id: &str) {
        *self.session_id.write() = Some(session_id.to_owned());
    }

    /// The bound session, if registered.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Try to enqueue a frame; false when the client's buffer is full.
    fn send(&self, frame: Arc<String>) -> bool {
        self.sender.try_send(frame).is_ok()
    }
}

/// The push channel: connection registries plus pending-ack slots.
pub struct PushChannel {
    by_user: DashMap<String, Vec<Arc<ClientConnection>>>,
    by_session: DashMap<String, Arc<ClientConnection>>,
    pending_acks: DashMap<String, oneshot::Sender<InstructionAck>>,
    ack_timeout: Duration,
    active_count: AtomicUsize,
}

impl PushChannel {
    /// Channel with the given acknowledgement wait bound.
    #[must_use]
    pub fn new(ack_timeout: Duration) -> Self {
        Self {
            by_user: DashMap::new(),
            by_session: DashMap::new(),
            pending_acks: DashMap::new(),
            ack_timeout,
            active_count: AtomicUsize::new(0),
        }
    }

    /// Register a connection under its user; a connection with the same id
    /// replaces the previous one without double-counting.
    pub fn register(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.by_user.entry(connection.user_id.clone()).or_default();
        let before = conns.len();
        conns.retain(|c| c.id != connection.id);
        let replaced = conns.len() < before;
        conns.push(Arc::clone(&connection));
        drop(conns);
        if !replaced {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
        metrics::gauge!("recall_ws_connections_active")
            .set(self.active_count.load(Ordering::Relaxed) as f64);
        debug!(connection_id = %connection.id, user_id = %connection.user_id, "connection registered");
    }

    /// Bind an already-registered connection to a session.
    pub fn bind_session(&self, session_id: &str, connection_id: &str) -> Result<()> {
        let connection = self
            .by_user
            .iter()
            .find_map(|entry| entry.value().iter().find(|c| c.id == connection_id).cloned())
            .ok_or_else(|| {
                RecallError::PushUnavailable(format!("unknown connection {connection_id}"))
            })?;
        connection.bind_session(session_id);
        let _ = self.by_session.insert(session_id.to_owned(), connection);
        Ok(())
    }

    /// Remove a connection from both registries.
    pub fn unregister(&self, connection_id: &str, user_id: &str) {
        let mut removed = false;
        if let Some(mut conns) = self.by_user.get_mut(user_id) {
            let before = conns.len();
            conns.retain(|c| c.id != connection_id);
            removed = conns.len() < before;
        }
        self.by_session
            .retain(|_, conn| conn.id != connection_id);
        if removed {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
            metrics::gauge!("recall_ws_connections_active")
                .set(self.active_count.load(Ordering::Relaxed) as f64);
        }
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    fn instruction_frame(instruction: &LocalInstruction) -> Arc<String> {
        Arc::new(
            json!({
                "type": "instruction",
                "data": instruction,
            })
            .to_string(),
        )
    }

    /// Push to the session's connection, falling back to any of the user's
    /// connections. Returns the ack receiver when a frame was delivered.
    pub fn push_to_session(
        &self,
        session_id: &str,
        user_id: &str,
        instruction: &LocalInstruction,
    ) -> Option<oneshot::Receiver<InstructionAck>> {
        let frame = Self::instruction_frame(instruction);

        let delivered = if let Some(conn) = self.by_session.get(session_id) {
            if conn.send(Arc::clone(&frame)) {
                true
            } else {
                warn!(session_id, connection_id = %conn.id, "session connection buffer full");
                false
            }
        } else {
            false
        };

        let delivered = delivered || self.push_to_user(user_id, &frame);
        if !delivered {
            counter!("recall_push_undeliverable_total").increment(1);
            debug!(
                session_id,
                user_id,
                callback_id = %instruction.callback_id,
                "no online client for instruction"
            );
            return None;
        }

        let (tx, rx) = oneshot::channel();
        let _ = self.pending_acks.insert(instruction.callback_id.clone(), tx);
        Some(rx)
    }

    fn push_to_user(&self, user_id: &str, frame: &Arc<String>) -> bool {
        let Some(conns) = self.by_user.get(user_id) else {
            return false;
        };
        let mut delivered = false;
        for conn in conns.iter() {
            if conn.send(Arc::clone(frame)) {
                delivered = true;
            } else {
                counter!("recall_push_drops_total").increment(1);
            }
        }
        delivered
    }

    /// Wait for the instruction's acknowledgement, bounded by the ack
    /// timeout. On expiry the pending slot is dropped and `None` returned;
    /// the instruction stays observable via its `callback_id`.
    pub async fn await_ack(
        &self,
        callback_id: &str,
        rx: oneshot::Receiver<InstructionAck>,
    ) -> Option<InstructionAck> {
        match tokio::time::timeout(self.ack_timeout, rx).await {
            Ok(Ok(ack)) => Some(ack),
            Ok(Err(_)) => {
                debug!(callback_id, "ack channel closed before acknowledgement");
                let _ = self.pending_acks.remove(callback_id);
                None
            }
            Err(_) => {
                counter!("recall_push_ack_timeouts_total").increment(1);
                warn!(callback_id, "instruction ack wait expired");
                let _ = self.pending_acks.remove(callback_id);
                None
            }
        }
    }

    /// Deliver a client acknowledgement. Unknown or late callback ids are
    /// accepted silently.
    pub fn ack_callback(&self, ack: InstructionAck) {
        match self.pending_acks.remove(&ack.callback_id) {
            Some((_, tx)) => {
                if tx.send(ack).is_err() {
                    debug!("ack receiver already dropped");
                }
            }
            None => {
                debug!(callback_id = %ack.callback_id, "ack for unknown or expired callback");
            }
        }
    }

    /// Graceful shutdown: drain and close both registries.
    pub fn disconnect_all(&self) {
        self.by_session.clear();
        self.by_user.clear();
        self.pending_acks.clear();
        self.active_count.store(0, Ordering::Relaxed);
        metrics::gauge!("recall_ws_connections_active").set(0.0);
        debug!("push channel drained");
    }
}
