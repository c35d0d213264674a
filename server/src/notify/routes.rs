//! REST endpoints for polling the notification history.
//!
//! Clients that were offline (or prefer polling) read their history here and
//! acknowledge it in bulk. The receiver id is a path parameter — session
//! mechanics live outside this subsystem.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::notify::store::Notification;
use crate::notify::NotifyError;
use crate::state::AppState;

fn into_status(e: NotifyError) -> StatusCode {
    tracing::error!(error = %e, "Notification request failed");
    match e {
        NotifyError::UserNotFound(_) | NotifyError::EventNotFound(_) => StatusCode::NOT_FOUND,
        NotifyError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// GET /api/users/{id}/notifications -- Full notification history.
pub async fn get_all_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Notification>>, StatusCode> {
    state
        .notifier
        .all_notifications(&user_id)
        .await
        .map(Json)
        .map_err(into_status)
}

/// GET /api/users/{id}/notifications/new -- Unseen notifications only.
pub async fn get_new_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Notification>>, StatusCode> {
    state
        .notifier
        .new_notifications(&user_id)
        .await
        .map(Json)
        .map_err(into_status)
}

/// PUT /api/users/{id}/notifications/seen -- Acknowledge the whole history.
/// Idempotent; an empty history is success.
pub async fn mark_notifications_seen(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    state
        .notifier
        .mark_all_seen(&user_id)
        .await
        .map(|_| StatusCode::OK)
        .map_err(into_status)
}
