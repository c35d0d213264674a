use axum::Router;

use crate::notify::routes as notify_routes;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes.
pub fn build_router(state: AppState) -> Router {
    // Notification polling surface
    let notification_routes = Router::new()
        .route(
            "/api/users/{id}/notifications",
            axum::routing::get(notify_routes::get_all_notifications),
        )
        .route(
            "/api/users/{id}/notifications/new",
            axum::routing::get(notify_routes::get_new_notifications),
        )
        .route(
            "/api/users/{id}/notifications/seen",
            axum::routing::put(notify_routes::mark_notifications_seen),
        );

    // WebSocket endpoint (identity supplied in-band via the handshake frame)
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    // Health check
    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(notification_routes)
        .merge(ws_routes)
        .merge(health)
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
