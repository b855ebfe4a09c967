//! Message protocol definitions
//!
//! JSON-based bidirectional frame protocol using Serde's tagged enum
//! (tag field `event`) for type-safe serialization/deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::{ConnectionId, RoomId, UserIdentity};

/// Client → Server frame
///
/// All frames from client to server. Uses tagged enum with snake_case naming.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to a room
    Join { room_id: String },
    /// Publish to a joined room
    Message { room_id: String, payload: String },
    /// Unsubscribe from a room
    Leave { room_id: String },
}

/// Server → Client frame
///
/// All frames from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection accepted, connection ID issued
    Connected {
        connection_id: String,
        user: Option<UserIdentity>,
    },
    /// Join acknowledged
    Joined { room_id: RoomId },
    /// Leave acknowledged
    Left { room_id: RoomId },
    /// Publish acknowledged
    Sent {
        room_id: RoomId,
        timestamp: DateTime<Utc>,
    },
    /// Message broadcast into a subscribed room
    Message {
        room_id: RoomId,
        sender: String,
        user: Option<UserIdentity>,
        payload: String,
        timestamp: DateTime<Utc>,
    },
    /// Error occurred
    Error {
        code: ErrorCode,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
    },
}

/// Error codes for ServerMessage::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Credentials rejected
    AuthFailure,
    /// Publish to a room that was not joined
    NotSubscribed,
    /// Room id failed validation
    InvalidRoom,
    /// Invalid frame format
    InvalidMessage,
    /// Connection already torn down on the server
    ConnectionClosed,
    /// Server-side transport failure
    Internal,
}

/// A unit of chat content published to a room
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub room_id: RoomId,
    pub sender: ConnectionId,
    pub user: Option<UserIdentity>,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        room_id: RoomId,
        sender: ConnectionId,
        user: Option<UserIdentity>,
        payload: String,
    ) -> Self {
        Self {
            room_id,
            sender,
            user,
            payload,
            timestamp: Utc::now(),
        }
    }
}

impl From<&ChatMessage> for ServerMessage {
    fn from(msg: &ChatMessage) -> Self {
        ServerMessage::Message {
            room_id: msg.room_id.clone(),
            sender: msg.sender.to_string(),
            user: msg.user.clone(),
            payload: msg.payload.clone(),
            timestamp: msg.timestamp,
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let (code, room_id) = match &err {
            AppError::AuthFailure(_) => (ErrorCode::AuthFailure, None),
            AppError::NotSubscribed(room) => (ErrorCode::NotSubscribed, Some(room.clone())),
            AppError::InvalidRoom(room) => (ErrorCode::InvalidRoom, Some(room.clone())),
            AppError::Json(_) => (ErrorCode::InvalidMessage, None),
            AppError::UnknownConnection | AppError::ChannelSend => {
                (ErrorCode::ConnectionClosed, None)
            }
            // Details stay in the server log
            AppError::WebSocket(_) => {
                return ServerMessage::Error {
                    code: ErrorCode::Internal,
                    message: "Internal error".to_string(),
                    room_id: None,
                }
            }
        };
        ServerMessage::Error {
            code,
            message: err.to_string(),
            room_id,
        }
    }
}
