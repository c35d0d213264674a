pub mod dispatcher;
pub mod payload;
pub mod routes;
pub mod store;

pub use dispatcher::Notifier;
pub use payload::{NotificationKind, PushPayload};
pub use store::{Notification, NotificationStore};

/// Errors surfaced by the notification subsystem.
///
/// Every operation is attempted exactly once — there is no retry policy.
/// Callers decide what a failed dispatch means for the triggering action;
/// in practice they log it and report success for the action itself.
#[derive(Debug)]
pub enum NotifyError {
    /// Actor lookup found no such user
    UserNotFound(String),
    /// Event lookup found no such event
    EventNotFound(String),
    /// Underlying storage failure
    Storage(String),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserNotFound(id) => write!(f, "User {} not found", id),
            Self::EventNotFound(id) => write!(f, "Event {} not found", id),
            Self::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}
