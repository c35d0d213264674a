use crate::db::DbPool;
use crate::notify::Notifier;
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Active WebSocket connections per user
    pub connections: ConnectionRegistry,
    /// Notification dispatcher
    pub notifier: Notifier,
}
