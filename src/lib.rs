//! Pub/Sub WebSocket Room Server Library
//!
//! A WebSocket room server built with tokio-tungstenite using the Actor
//! pattern for state management.
//!
//! # Features
//! - WebSocket connection handling with optional token authentication
//! - Named rooms (e.g. `chat_room:lobby`), created on first join
//! - Fan-out of messages to every other subscriber of a room
//! - Cleanup of all subscriptions on disconnect or failed delivery
//! - Optional per-room message history
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `RoomServer` is the central actor owning the connection registry and
//!   room directory
//! - Each connection has a `handler` task talking to the server through a
//!   `Session`
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use room_server::{handle_connection, AnonymousAuthenticator, Gateway, RoomServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(RoomServer::new(cmd_rx).run());
//!     let gateway = Gateway::new(cmd_tx, Arc::new(AnonymousAuthenticator));
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, gateway.clone()));
//!     }
//! }
//! ```

pub mod auth;
pub mod broadcaster;
pub mod config;
pub mod connection;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod history;
pub mod message;
pub mod registry;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use auth::{AnonymousAuthenticator, Authenticator, Credentials, TokenAuthenticator};
pub use broadcaster::{Broadcaster, FanOut};
pub use config::ServerConfig;
pub use connection::Connection;
pub use directory::RoomDirectory;
pub use error::{AppError, AuthError, SendError, StoreError};
pub use gateway::{Gateway, Session};
pub use handler::{handle_connection, serve_stream};
pub use history::{spawn_history_writer, InMemoryStore, MessageStore};
pub use message::{ChatMessage, ClientMessage, ErrorCode, ServerMessage};
pub use registry::ConnectionRegistry;
pub use room::Room;
pub use server::{RoomServer, ServerCommand, ServerStats};
pub use types::{ConnectionId, RoomId, UserIdentity};
