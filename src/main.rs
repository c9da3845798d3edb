//! Multi-room WebSocket Chat Hub - Entry Point
//!
//! Loads configuration, starts the ChatServer actor and accepts connections.

use std::env;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chat_hub::{handle_connection, ChatServer, Config, SessionHub};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Missing .env is fine; the process environment still applies
    dotenv::dotenv().ok();

    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_hub=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_hub=info")),
        )
        .init();

    let mut config = Config::from_env()?;

    // Bind address from command line overrides the environment
    if let Some(addr) = env::args().nth(1) {
        config.addr = addr;
    }
    if config.require_auth && config.jwt_secret.is_none() {
        warn!("CHAT_REQUIRE_AUTH is set without JWT_SECRET; nobody will be able to join");
    }

    let listener = TcpListener::bind(&config.addr).await?;
    info!("WebSocket Chat Hub listening on {}", config.addr);

    // Create ChatServer actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    let server = ChatServer::new(cmd_rx, SessionHub::new(&config));
    tokio::spawn(server.run());

    info!(
        history_capacity = config.history_capacity,
        auth = config.jwt_secret.is_some(),
        "ChatServer actor started"
    );

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();
                let buffer = config.client_buffer;

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, cmd_tx, buffer).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
