//! Pub/Sub WebSocket Room Server - Entry Point
//!
//! Starts the TCP listener, history writer and RoomServer actor, accepting
//! connections.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use room_server::{
    handle_connection, spawn_history_writer, Gateway, InMemoryStore, RoomServer, ServerConfig,
};

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=room_server=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("room_server=info")),
        )
        .init();

    let mut config = ServerConfig::from_env();

    // Bind address from command line overrides the environment
    if let Some(addr) = env::args().nth(1) {
        config.addr = addr;
    }

    // Start TCP listener
    let listener = TcpListener::bind(&config.addr).await?;
    info!("WebSocket Room Server listening on {}", config.addr);

    // Create RoomServer actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let mut server = RoomServer::new(cmd_rx).with_echo_to_sender(config.echo_to_sender);
    if config.history_limit > 0 {
        let store = Arc::new(InMemoryStore::new(config.history_limit));
        server = server.with_history(spawn_history_writer(store));
        info!("Keeping last {} messages per room", config.history_limit);
    }
    tokio::spawn(server.run());

    info!("RoomServer actor started");

    let gateway = Gateway::new(cmd_tx, config.authenticator())
        .with_max_room_id_len(config.max_room_id_len)
        .with_outbound_buffer(config.outbound_buffer);

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("New connection from {}", addr);
                let gateway = gateway.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, gateway).await {
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
