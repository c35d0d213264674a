//! User and event lookups consumed by the notification dispatcher.
//!
//! The rest of the backend owns user/event CRUD; the dispatcher only needs
//! to resolve an id into the handful of fields that go into a notification.
//! Both lookups are trait seams so tests can substitute doubles.

use rusqlite::OptionalExtension;

use crate::db::DbPool;

/// Snapshot of a user as it appears in notifications.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub image_url: String,
}

/// Snapshot of an event as it appears in notifications.
#[derive(Debug, Clone)]
pub struct EventSummary {
    pub id: String,
    pub title: String,
}

/// Errors surfaced by the lookup collaborators.
#[derive(Debug)]
pub enum DirectoryError {
    /// No row for the requested id
    NotFound,
    /// Underlying storage failure
    Storage(String),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

/// Resolve a user id to its notification snapshot.
/// Blocking — callers run this under tokio::task::spawn_blocking.
pub trait UserLookup: Send + Sync {
    fn user_by_id(&self, id: &str) -> Result<UserProfile, DirectoryError>;
}

/// Resolve an event id to its notification snapshot.
/// Blocking — callers run this under tokio::task::spawn_blocking.
pub trait EventLookup: Send + Sync {
    fn event_by_id(&self, id: &str) -> Result<EventSummary, DirectoryError>;
}

/// Production lookups backed by the shared SQLite connection.
#[derive(Clone)]
pub struct SqliteDirectory {
    db: DbPool,
}

impl SqliteDirectory {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl UserLookup for SqliteDirectory {
    fn user_by_id(&self, id: &str) -> Result<UserProfile, DirectoryError> {
        let conn = self
            .db
            .lock()
            .map_err(|_| DirectoryError::Storage("database lock poisoned".to_string()))?;

        conn.query_row(
            "SELECT id, name, surname, image_url FROM users WHERE id = ?1",
            rusqlite::params![id],
            |row| {
                Ok(UserProfile {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    surname: row.get(2)?,
                    image_url: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(|e| DirectoryError::Storage(e.to_string()))?
        .ok_or(DirectoryError::NotFound)
    }
}

impl EventLookup for SqliteDirectory {
    fn event_by_id(&self, id: &str) -> Result<EventSummary, DirectoryError> {
        let conn = self
            .db
            .lock()
            .map_err(|_| DirectoryError::Storage("database lock poisoned".to_string()))?;

        conn.query_row(
            "SELECT id, title FROM events WHERE id = ?1",
            rusqlite::params![id],
            |row| {
                Ok(EventSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                })
            },
        )
        .optional()
        .map_err(|e| DirectoryError::Storage(e.to_string()))?
        .ok_or(DirectoryError::NotFound)
    }
}
