//! Integration tests for WebSocket upgrade, identity handshake, ping/pong,
//! live push delivery, and the REST polling surface.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use gatherly_server::db::{self, DbPool};
use gatherly_server::directory::SqliteDirectory;
use gatherly_server::notify::{NotificationStore, Notifier};
use gatherly_server::state::AppState;
use gatherly_server::ws::ConnectionRegistry;

/// Helper: start the server on a random port and return (addr, state).
/// The returned state shares the registry and notifier with the server.
async fn start_test_server() -> (SocketAddr, AppState) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = db::init_db(&data_dir).expect("Failed to init DB");
    let connections = ConnectionRegistry::new();
    let directory = Arc::new(SqliteDirectory::new(db.clone()));
    let notifier = Notifier::new(
        NotificationStore::new(db.clone()),
        connections.clone(),
        directory.clone(),
        directory,
    );

    let state = AppState {
        db,
        connections,
        notifier,
    };

    let app = gatherly_server::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        let _keep = tmp_dir;
    });

    (addr, state)
}

fn seed_user(db: &DbPool, id: &str, name: &str, surname: &str) {
    let conn = db.lock().unwrap();
    conn.execute(
        "INSERT INTO users (id, name, surname, image_url) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, name, surname, format!("https://img.gatherly.test/{}.png", id)],
    )
    .unwrap();
}

fn seed_event(db: &DbPool, id: &str, title: &str) {
    let conn = db.lock().unwrap();
    conn.execute(
        "INSERT INTO events (id, title) VALUES (?1, ?2)",
        rusqlite::params![id, title],
    )
    .unwrap();
}

/// Wait until the handshake registered the user's connection.
async fn wait_connected(state: &AppState, user_id: &str) {
    for _ in 0..100 {
        if state.connections.is_connected(user_id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("User {} never registered", user_id);
}

#[tokio::test]
async fn test_ws_identify_then_live_push() {
    let (addr, state) = start_test_server().await;
    seed_user(&state.db, "3", "Iva", "Horvat");
    seed_event(&state.db, "55", "Rooftop BBQ");

    let ws_url = format!("ws://{}/ws", addr);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect to WebSocket");
    let (mut write, mut read) = ws_stream.split();

    // Identity handshake: first frame carries the user id
    write
        .send(Message::Text(r#"{"id":"7"}"#.into()))
        .await
        .expect("Failed to send identity frame");
    wait_connected(&state, "7").await;

    // Trigger a dispatch; the receiver is connected, so it gets a live push
    state
        .notifier
        .invitation("7", "3", "55")
        .await
        .expect("Dispatch failed");

    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("Expected a live push within timeout");

    match msg {
        Some(Ok(Message::Text(text))) => {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value["type"], "invite");
            assert_eq!(value["userId"], "3");
            assert_eq!(value["eventId"], "55");
            assert_eq!(value["eventTitle"], "Rooftop BBQ");
        }
        other => panic!("Expected text push, got: {:?}", other),
    }

    // The history records the delivery as already seen
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{}/api/users/7/notifications", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["seen"], true);
    assert_eq!(body[0]["type"], "invite");
}

#[tokio::test]
async fn test_ws_malformed_identity_rejected() {
    let (addr, state) = start_test_server().await;

    let ws_url = format!("ws://{}/ws", addr);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect");
    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text("not json".into()))
        .await
        .expect("Failed to send");

    // Server should close with 4002 (malformed identity); a bare close or
    // stream end is also acceptable — the point is no registration happens.
    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("Expected close within timeout");

    match msg {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(
                frame.code,
                tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::from(4002),
                "Expected close code 4002 (malformed identity)"
            );
        }
        Some(Ok(Message::Close(None))) | None => {}
        other => {
            if let Some(Ok(msg)) = other {
                assert!(msg.is_close(), "Expected close message, got: {:?}", msg);
            }
        }
    }

    assert!(
        !state.connections.is_connected("7"),
        "Malformed handshake must not register anything"
    );
}

#[tokio::test]
async fn test_ws_empty_identity_rejected() {
    let (addr, state) = start_test_server().await;

    let ws_url = format!("ws://{}/ws", addr);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect");
    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(r#"{"id":""}"#.into()))
        .await
        .expect("Failed to send");

    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("Expected close within timeout");

    if let Some(Ok(msg)) = msg {
        assert!(msg.is_close(), "Expected close message, got: {:?}", msg);
    }
    assert!(!state.connections.is_connected(""));
}

#[tokio::test]
async fn test_ws_ping_pong() {
    let (addr, state) = start_test_server().await;

    let ws_url = format!("ws://{}/ws", addr);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect");
    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(r#"{"id":"7"}"#.into()))
        .await
        .expect("Failed to send identity frame");
    wait_connected(&state, "7").await;

    // Send a client ping
    write
        .send(Message::Ping(vec![42, 43, 44].into()))
        .await
        .expect("Failed to send ping");

    // We should receive a pong back
    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("Expected pong within timeout");

    match msg {
        Some(Ok(Message::Pong(data))) => {
            assert_eq!(data.as_ref(), &[42, 43, 44], "Pong data should match ping");
        }
        other => panic!("Expected Pong message, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_ws_superseded_connection_closed() {
    let (addr, state) = start_test_server().await;
    seed_user(&state.db, "3", "Iva", "Horvat");

    let ws_url = format!("ws://{}/ws", addr);

    // First connection for user "7"
    let (ws_a, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect first socket");
    let (mut write_a, mut read_a) = ws_a.split();
    write_a
        .send(Message::Text(r#"{"id":"7"}"#.into()))
        .await
        .unwrap();
    wait_connected(&state, "7").await;

    // Second connection for the same user replaces the first
    let (ws_b, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect second socket");
    let (mut write_b, mut read_b) = ws_b.split();
    write_b
        .send(Message::Text(r#"{"id":"7"}"#.into()))
        .await
        .unwrap();

    // The first socket is told to close with the superseded code
    let msg = tokio::time::timeout(Duration::from_secs(2), read_a.next())
        .await
        .expect("Expected close on superseded socket");

    match msg {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(
                frame.code,
                tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::from(4000),
                "Expected close code 4000 (superseded)"
            );
        }
        other => panic!("Expected close frame, got: {:?}", other),
    }

    // Dispatch routes through the replacement
    state
        .notifier
        .new_subscriber("7", "3")
        .await
        .expect("Dispatch failed");

    let msg = tokio::time::timeout(Duration::from_secs(2), read_b.next())
        .await
        .expect("Expected push on replacement socket");

    match msg {
        Some(Ok(Message::Text(text))) => {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value["type"], "subscription");
            assert_eq!(value["userId"], "3");
        }
        other => panic!("Expected text push, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_offline_history_via_rest() {
    let (addr, state) = start_test_server().await;
    seed_user(&state.db, "3", "Iva", "Horvat");

    // No live connection for user "7" — dispatch persists unseen
    state
        .notifier
        .new_subscriber("7", "3")
        .await
        .expect("Dispatch failed");

    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/api/users/7/notifications/new", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["type"], "subscription");
    assert_eq!(body[0]["actor_id"], "3");
    assert_eq!(body[0]["seen"], false);

    // Acknowledge, then the unseen listing is empty — twice, idempotently
    for _ in 0..2 {
        let resp = client
            .put(format!("http://{}/api/users/7/notifications/seen", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let resp = client
        .get(format!("http://{}/api/users/7/notifications/new", addr))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body.as_array().unwrap().is_empty());

    // Full history still shows the record, now seen
    let resp = client
        .get(format!("http://{}/api/users/7/notifications", addr))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["seen"], true);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (addr, _state) = start_test_server().await;

    let resp = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}
