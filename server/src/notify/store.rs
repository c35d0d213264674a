//! Durable notification history, one row per delivery attempt.
//!
//! The store is the system of record: the dispatcher writes a row on every
//! path, live-delivered or not, with the seen flag recording the outcome.
//! Rows carry a denormalized actor snapshot and are never updated except
//! for the forward-only seen flag.

use chrono::Utc;
use serde::Serialize;

use crate::db::DbPool;
use crate::directory::{EventSummary, UserProfile};
use crate::notify::payload::NotificationKind;
use crate::notify::NotifyError;

/// Persisted notification record as returned to polling clients.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub receiver_id: String,
    pub actor_id: String,
    pub actor_name: String,
    pub actor_surname: String,
    pub actor_image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_title: Option<String>,
    pub seen: bool,
    pub created_at: String,
}

/// SQLite-backed notification store.
#[derive(Clone)]
pub struct NotificationStore {
    db: DbPool,
}

impl NotificationStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Append a subscription notification for `receiver_id`.
    pub async fn create_subscription(
        &self,
        receiver_id: &str,
        actor: &UserProfile,
        seen: bool,
    ) -> Result<(), NotifyError> {
        self.insert(NotificationKind::Subscription, receiver_id, actor, None, seen)
            .await
    }

    /// Append an invitation notification for `receiver_id`.
    pub async fn create_invite(
        &self,
        receiver_id: &str,
        actor: &UserProfile,
        event: &EventSummary,
        seen: bool,
    ) -> Result<(), NotifyError> {
        self.insert(NotificationKind::Invite, receiver_id, actor, Some(event), seen)
            .await
    }

    /// Append a new-event notification for `receiver_id`.
    pub async fn create_new_event(
        &self,
        receiver_id: &str,
        actor: &UserProfile,
        event: &EventSummary,
        seen: bool,
    ) -> Result<(), NotifyError> {
        self.insert(NotificationKind::NewEvent, receiver_id, actor, Some(event), seen)
            .await
    }

    /// Append an event-reminder notification for `receiver_id`.
    pub async fn create_reminder(
        &self,
        receiver_id: &str,
        actor: &UserProfile,
        event: &EventSummary,
        seen: bool,
    ) -> Result<(), NotifyError> {
        self.insert(
            NotificationKind::EventReminder,
            receiver_id,
            actor,
            Some(event),
            seen,
        )
        .await
    }

    /// Insert one record. No dedup — the same (receiver, actor, event)
    /// triple is recorded again each time it is triggered.
    async fn insert(
        &self,
        kind: NotificationKind,
        receiver_id: &str,
        actor: &UserProfile,
        event: Option<&EventSummary>,
        seen: bool,
    ) -> Result<(), NotifyError> {
        let db = self.db.clone();
        let receiver_id = receiver_id.to_string();
        let actor = actor.clone();
        let event = event.cloned();
        let created_at = Utc::now().to_rfc3339();

        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| NotifyError::Storage("database lock poisoned".to_string()))?;

            conn.execute(
                "INSERT INTO notifications (kind, receiver_id, actor_id, actor_name, actor_surname,
                                            actor_image_url, event_id, event_title, seen, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    kind.as_str(),
                    receiver_id,
                    actor.id,
                    actor.name,
                    actor.surname,
                    actor.image_url,
                    event.as_ref().map(|e| e.id.as_str()),
                    event.as_ref().map(|e| e.title.as_str()),
                    seen,
                    created_at,
                ],
            )
            .map_err(|e| NotifyError::Storage(e.to_string()))?;

            Ok(())
        })
        .await
        .map_err(|e| NotifyError::Storage(e.to_string()))?
    }

    /// All notifications for `receiver_id`, in insertion order.
    pub async fn list_all(&self, receiver_id: &str) -> Result<Vec<Notification>, NotifyError> {
        self.list(receiver_id, false).await
    }

    /// Unseen notifications for `receiver_id`, in insertion order.
    pub async fn list_unseen(&self, receiver_id: &str) -> Result<Vec<Notification>, NotifyError> {
        self.list(receiver_id, true).await
    }

    async fn list(
        &self,
        receiver_id: &str,
        unseen_only: bool,
    ) -> Result<Vec<Notification>, NotifyError> {
        let db = self.db.clone();
        let receiver_id = receiver_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| NotifyError::Storage("database lock poisoned".to_string()))?;

            let sql = if unseen_only {
                "SELECT id, kind, receiver_id, actor_id, actor_name, actor_surname,
                        actor_image_url, event_id, event_title, seen, created_at
                 FROM notifications
                 WHERE receiver_id = ?1 AND seen = 0
                 ORDER BY id ASC"
            } else {
                "SELECT id, kind, receiver_id, actor_id, actor_name, actor_surname,
                        actor_image_url, event_id, event_title, seen, created_at
                 FROM notifications
                 WHERE receiver_id = ?1
                 ORDER BY id ASC"
            };

            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| NotifyError::Storage(e.to_string()))?;

            let notifications: Vec<Notification> = stmt
                .query_map(rusqlite::params![receiver_id], |row| {
                    Ok(Notification {
                        id: row.get(0)?,
                        kind: row.get(1)?,
                        receiver_id: row.get(2)?,
                        actor_id: row.get(3)?,
                        actor_name: row.get(4)?,
                        actor_surname: row.get(5)?,
                        actor_image_url: row.get(6)?,
                        event_id: row.get(7)?,
                        event_title: row.get(8)?,
                        seen: row.get(9)?,
                        created_at: row.get(10)?,
                    })
                })
                .map_err(|e| NotifyError::Storage(e.to_string()))?
                .filter_map(|r| r.ok())
                .collect();

            Ok(notifications)
        })
        .await
        .map_err(|e| NotifyError::Storage(e.to_string()))?
    }

    /// Set seen=true on every record belonging to `receiver_id`.
    /// Idempotent — running it again is a no-op, not an error.
    pub async fn mark_all_seen(&self, receiver_id: &str) -> Result<(), NotifyError> {
        let db = self.db.clone();
        let receiver_id = receiver_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| NotifyError::Storage("database lock poisoned".to_string()))?;

            conn.execute(
                "UPDATE notifications SET seen = 1 WHERE receiver_id = ?1",
                rusqlite::params![receiver_id],
            )
            .map_err(|e| NotifyError::Storage(e.to_string()))?;

            Ok(())
        })
        .await
        .map_err(|e| NotifyError::Storage(e.to_string()))?
    }

    /// Remove the subscription notifications `actor_id` caused for
    /// `receiver_id`. Used when a subscription is withdrawn.
    pub async fn delete_subscription(
        &self,
        receiver_id: &str,
        actor_id: &str,
    ) -> Result<(), NotifyError> {
        let db = self.db.clone();
        let receiver_id = receiver_id.to_string();
        let actor_id = actor_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| NotifyError::Storage("database lock poisoned".to_string()))?;

            conn.execute(
                "DELETE FROM notifications
                 WHERE receiver_id = ?1 AND actor_id = ?2 AND kind = 'subscription'",
                rusqlite::params![receiver_id, actor_id],
            )
            .map_err(|e| NotifyError::Storage(e.to_string()))?;

            Ok(())
        })
        .await
        .map_err(|e| NotifyError::Storage(e.to_string()))?
    }
}
