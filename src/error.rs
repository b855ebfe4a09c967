//! Error types for the room server
//!
//! Defines application-level errors, per-recipient delivery errors and
//! the errors reported by the authentication and history collaborators.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send error frame to client).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Credentials rejected at connect time (fatal)
    #[error("Authentication failed: {0}")]
    AuthFailure(#[from] AuthError),

    /// Message sent to a room the connection has not joined
    #[error("Not subscribed to room: {0}")]
    NotSubscribed(String),

    /// Room id failed validation
    #[error("Invalid room id: {0:?}")]
    InvalidRoom(String),

    /// Connection is no longer registered (disconnect race)
    #[error("Unknown connection")]
    UnknownConnection,
}

/// Message send errors
///
/// Occurs when delivering to a connection whose transport is closing,
/// or that has stopped reading.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The outbound queue is at capacity
    #[error("Outbound queue full")]
    QueueFull,
}

/// Authentication collaborator errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("invalid token")]
    InvalidToken,
}

/// History collaborator errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
