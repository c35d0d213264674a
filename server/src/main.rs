use std::sync::Arc;
use tokio::net::TcpListener;

use gatherly_server::config::{generate_config_template, Config};
use gatherly_server::db;
use gatherly_server::directory::SqliteDirectory;
use gatherly_server::notify::{NotificationStore, Notifier};
use gatherly_server::routes;
use gatherly_server::state::AppState;
use gatherly_server::ws::ConnectionRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "gatherly_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "gatherly_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!(
        "Gatherly notification server v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize SQLite database
    let db = db::init_db(&config.data_dir)?;

    // Wire the notification subsystem: registry shared between the WebSocket
    // acceptor and the dispatcher, directory lookups over the same database.
    let connections = ConnectionRegistry::new();
    let directory = Arc::new(SqliteDirectory::new(db.clone()));
    let store = NotificationStore::new(db.clone());
    let notifier = Notifier::new(
        store,
        connections.clone(),
        directory.clone(),
        directory,
    );

    // Build application state
    let app_state = AppState {
        db,
        connections,
        notifier,
    };

    // Build router
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
