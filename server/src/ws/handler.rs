use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;

use crate::state::AppState;
use crate::ws::actor;

/// How long a fresh connection gets to identify itself.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket close codes for rejected handshakes:
/// 4001 = no identity frame within the deadline
/// 4002 = malformed identity frame
const CLOSE_HANDSHAKE_TIMEOUT: u16 = 4001;
const CLOSE_BAD_IDENTITY: u16 = 4002;

/// First frame a client must send after the upgrade: `{"id": "<userId>"}`.
/// The identity is trusted as supplied — there is no in-band
/// re-authentication against the session layer.
#[derive(Debug, Deserialize)]
struct IdentityFrame {
    id: String,
}

/// GET /ws
/// WebSocket upgrade endpoint. The server performs exactly one read
/// expecting the identity frame; on success the connection is registered
/// and handed to the actor, on failure it is logged and abandoned.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| identify_and_run(socket, state))
}

/// Run the identity handshake, then the connection actor.
async fn identify_and_run(mut socket: WebSocket, state: AppState) {
    let frame = match timeout(HANDSHAKE_TIMEOUT, socket.recv()).await {
        Ok(frame) => frame,
        Err(_) => {
            tracing::warn!("Handshake timed out waiting for identity frame");
            close_and_drop(socket, CLOSE_HANDSHAKE_TIMEOUT, "Identity frame timeout").await;
            return;
        }
    };

    let text = match frame {
        Some(Ok(Message::Text(text))) => text,
        Some(Ok(other)) => {
            tracing::warn!("Handshake expected a text frame, got: {:?}", other);
            close_and_drop(socket, CLOSE_BAD_IDENTITY, "Identity frame required").await;
            return;
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Handshake read failed");
            return;
        }
        None => {
            tracing::warn!("Connection closed before identity frame");
            return;
        }
    };

    let user_id = match serde_json::from_str::<IdentityFrame>(&text) {
        Ok(frame) if !frame.id.is_empty() => frame.id,
        Ok(_) => {
            tracing::warn!("Handshake rejected: empty user id");
            close_and_drop(socket, CLOSE_BAD_IDENTITY, "Empty user id").await;
            return;
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Handshake rejected: malformed identity frame: {}",
                text.chars().take(100).collect::<String>()
            );
            close_and_drop(socket, CLOSE_BAD_IDENTITY, "Malformed identity frame").await;
            return;
        }
    };

    tracing::info!(user_id = %user_id, "WebSocket connection identified");

    actor::run_connection(socket, state, user_id).await;
}

/// Send a Close frame with the given application code, then drop the socket.
async fn close_and_drop(mut socket: WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}
