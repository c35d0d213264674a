//! Connection registry: one live push channel per user.
//!
//! Registration is last-write-wins — a newer connection for the same user
//! replaces the older one, and the superseded connection is sent a Close
//! frame so its actor shuts down instead of lingering half-dead.

use axum::extract::ws::{CloseFrame, Message};
use dashmap::DashMap;
use std::sync::Arc;

use super::ConnectionSender;

/// Close code sent to a connection replaced by a newer one for the same user.
pub const CLOSE_SUPERSEDED: u16 = 4000;

/// In-memory table of live connections, keyed by user id.
///
/// Cloneable handle — build one in main, share it between the WebSocket
/// acceptor and the notification dispatcher. Entries are cheap sender
/// handles; no network I/O ever happens while a map lock is held.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<String, ConnectionSender>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
        }
    }

    /// Install `sender` as the current live channel for `user_id`,
    /// unconditionally replacing any prior entry. The replaced sender, if
    /// any, gets a Close frame so its actor tears itself down.
    pub fn register(&self, user_id: &str, sender: ConnectionSender) {
        let replaced = self.connections.insert(user_id.to_string(), sender);

        if let Some(old) = replaced {
            let _ = old.send(Message::Close(Some(CloseFrame {
                code: CLOSE_SUPERSEDED,
                reason: "Superseded by newer connection".into(),
            })));
            tracing::debug!(user_id = %user_id, "Connection replaced, prior channel closed");
        } else {
            tracing::debug!(user_id = %user_id, "Connection registered");
        }
    }

    /// Clear the entry for `user_id`. No-op if none exists.
    pub fn unregister(&self, user_id: &str) {
        self.connections.remove(user_id);
        tracing::debug!(user_id = %user_id, "Connection unregistered");
    }

    /// Clear the entry for `user_id` only if it still belongs to `sender`.
    /// Actor cleanup uses this so a dying connection never evicts the newer
    /// connection that replaced it.
    pub fn unregister_if_same(&self, user_id: &str, sender: &ConnectionSender) {
        self.connections
            .remove_if(user_id, |_, current| current.same_channel(sender));
    }

    /// Return the current live channel for `user_id`, if any.
    pub fn lookup(&self, user_id: &str) -> Option<ConnectionSender> {
        self.connections.get(user_id).map(|entry| entry.value().clone())
    }

    /// Whether `user_id` currently has a live channel.
    pub fn is_connected(&self, user_id: &str) -> bool {
        self.connections.contains_key(user_id)
    }
}
