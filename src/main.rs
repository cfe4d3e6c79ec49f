use anyhow::{Context, Result};
use dudes::api::create_app;
use dudes::chat::IrcChatSource;
use dudes::config::{load_config, DudesConfig};
use dudes::room::RoomRegistry;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dudes=info".into()),
        )
        .init();

    info!("Dudes server starting...");

    let config = match std::env::var("DUDES_CONFIG") {
        Ok(path) => load_config(&path)
            .with_context(|| format!("Failed to load config '{}'", path))?,
        Err(_) => DudesConfig::default(),
    };

    info!(
        bind_addr = %config.server.bind_addr,
        chat_host = %config.chat.host,
        chat_port = config.chat.port,
        "Configuration loaded"
    );

    let source = Arc::new(IrcChatSource::new(config.chat.irc()));
    let registry = RoomRegistry::from_config(source, &config.chat).shared();

    let app = create_app(Arc::clone(&registry));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    info!(addr = %config.server.bind_addr, "Listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();

    // Dropping each bridge aborts its upstream connection
    let rooms = registry.room_count().await;
    drop(registry);
    info!(rooms, "Dudes server stopped");

    Ok(())
}
