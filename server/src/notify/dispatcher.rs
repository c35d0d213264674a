//! Notification dispatcher: live push with persistence fallback.
//!
//! Every dispatch persists a record — live push is a latency optimization,
//! never the sole channel. A record is created seen=true when the push was
//! handed to a live connection, seen=false otherwise, so polling clients
//! always observe a consistent history.

use axum::extract::ws::Message;
use std::sync::Arc;

use crate::directory::{DirectoryError, EventLookup, EventSummary, UserLookup, UserProfile};
use crate::notify::payload::{NotificationKind, PushPayload};
use crate::notify::store::{Notification, NotificationStore};
use crate::notify::NotifyError;
use crate::ws::ConnectionRegistry;

/// Orchestrates notification delivery for one domain action at a time.
///
/// Cloneable — runs on whichever task handles the triggering request; many
/// dispatches execute concurrently with no global serialization. Errors are
/// returned to the caller unmodified, exactly once per operation; the
/// triggering action is expected to log and ignore them rather than roll
/// itself back.
#[derive(Clone)]
pub struct Notifier {
    store: NotificationStore,
    connections: ConnectionRegistry,
    users: Arc<dyn UserLookup>,
    events: Arc<dyn EventLookup>,
}

impl Notifier {
    pub fn new(
        store: NotificationStore,
        connections: ConnectionRegistry,
        users: Arc<dyn UserLookup>,
        events: Arc<dyn EventLookup>,
    ) -> Self {
        Self {
            store,
            connections,
            users,
            events,
        }
    }

    /// Someone subscribed to `receiver_id`.
    pub async fn new_subscriber(
        &self,
        receiver_id: &str,
        actor_id: &str,
    ) -> Result<(), NotifyError> {
        let actor = self.resolve_user(actor_id).await?;
        let payload = PushPayload::subscription(&actor);
        let seen = self.push_live(receiver_id, &payload);
        self.store.create_subscription(receiver_id, &actor, seen).await
    }

    /// `actor_id` invited `receiver_id` to an event.
    pub async fn invitation(
        &self,
        receiver_id: &str,
        actor_id: &str,
        event_id: &str,
    ) -> Result<(), NotifyError> {
        let actor = self.resolve_user(actor_id).await?;
        let event = self.resolve_event(event_id).await?;
        let payload = PushPayload::for_event(NotificationKind::Invite, &actor, &event);
        let seen = self.push_live(receiver_id, &payload);
        self.store
            .create_invite(receiver_id, &actor, &event, seen)
            .await
    }

    /// `actor_id` created an event `receiver_id` cares about.
    /// Fan-out to subscribers is performed by the caller, one call per receiver.
    pub async fn new_event(
        &self,
        receiver_id: &str,
        actor_id: &str,
        event_id: &str,
    ) -> Result<(), NotifyError> {
        let actor = self.resolve_user(actor_id).await?;
        let event = self.resolve_event(event_id).await?;
        let payload = PushPayload::for_event(NotificationKind::NewEvent, &actor, &event);
        let seen = self.push_live(receiver_id, &payload);
        self.store
            .create_new_event(receiver_id, &actor, &event, seen)
            .await
    }

    /// An event `receiver_id` cares about is coming up.
    pub async fn event_reminder(
        &self,
        receiver_id: &str,
        actor_id: &str,
        event_id: &str,
    ) -> Result<(), NotifyError> {
        let actor = self.resolve_user(actor_id).await?;
        let event = self.resolve_event(event_id).await?;
        let payload = PushPayload::for_event(NotificationKind::EventReminder, &actor, &event);
        let seen = self.push_live(receiver_id, &payload);
        self.store
            .create_reminder(receiver_id, &actor, &event, seen)
            .await
    }

    /// Pass-through deletion of subscription notifications, used when
    /// `actor_id` withdraws their subscription to `receiver_id`.
    pub async fn remove_subscription_notification(
        &self,
        receiver_id: &str,
        actor_id: &str,
    ) -> Result<(), NotifyError> {
        self.store.delete_subscription(receiver_id, actor_id).await
    }

    /// Full notification history for `receiver_id`.
    pub async fn all_notifications(
        &self,
        receiver_id: &str,
    ) -> Result<Vec<Notification>, NotifyError> {
        self.store.list_all(receiver_id).await
    }

    /// Notifications `receiver_id` has not seen yet.
    pub async fn new_notifications(
        &self,
        receiver_id: &str,
    ) -> Result<Vec<Notification>, NotifyError> {
        self.store.list_unseen(receiver_id).await
    }

    /// Mark everything for `receiver_id` as seen.
    pub async fn mark_all_seen(&self, receiver_id: &str) -> Result<(), NotifyError> {
        self.store.mark_all_seen(receiver_id).await
    }

    /// Attempt live delivery. Returns true only when the payload was handed
    /// to a registered connection; on a failed handoff the channel is
    /// presumed dead and reaped, and the caller persists unseen.
    fn push_live(&self, receiver_id: &str, payload: &PushPayload) -> bool {
        let Some(sender) = self.connections.lookup(receiver_id) else {
            return false;
        };

        let json = match serde_json::to_string(payload) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode push payload");
                return false;
            }
        };

        if sender.send(Message::Text(json.into())).is_ok() {
            true
        } else {
            tracing::debug!(
                user_id = %receiver_id,
                "Live push failed, reaping dead connection"
            );
            self.connections.unregister_if_same(receiver_id, &sender);
            false
        }
    }

    async fn resolve_user(&self, user_id: &str) -> Result<UserProfile, NotifyError> {
        let users = self.users.clone();
        let id = user_id.to_string();

        tokio::task::spawn_blocking(move || users.user_by_id(&id))
            .await
            .map_err(|e| NotifyError::Storage(e.to_string()))?
            .map_err(|e| match e {
                DirectoryError::NotFound => NotifyError::UserNotFound(user_id.to_string()),
                DirectoryError::Storage(msg) => NotifyError::Storage(msg),
            })
    }

    async fn resolve_event(&self, event_id: &str) -> Result<EventSummary, NotifyError> {
        let events = self.events.clone();
        let id = event_id.to_string();

        tokio::task::spawn_blocking(move || events.event_by_id(&id))
            .await
            .map_err(|e| NotifyError::Storage(e.to_string()))?
            .map_err(|e| match e {
                DirectoryError::NotFound => NotifyError::EventNotFound(event_id.to_string()),
                DirectoryError::Storage(msg) => NotifyError::Storage(msg),
            })
    }
}
