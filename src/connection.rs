//! Connection struct definition
//!
//! Represents one live transport session with its identity, joined rooms
//! and outbound channel.

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{ConnectionId, RoomId, UserIdentity};

/// Live connection information
///
/// Holds all state related to a connected client including their
/// unique ID, optional identity, joined rooms and message sender channel.
/// The sender is bounded; fan-out never waits on it.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Authenticated user (None for anonymous connections)
    pub user: Option<UserIdentity>,
    /// Rooms this connection is subscribed to
    pub rooms: HashSet<RoomId>,
    /// Server → Client message channel
    pub sender: mpsc::Sender<ServerMessage>,
}

impl Connection {
    /// Create a new connection with the given ID and sender channel
    pub fn new(
        id: ConnectionId,
        user: Option<UserIdentity>,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            id,
            user,
            rooms: HashSet::new(),
            sender,
        }
    }

    /// Queue a message for this connection without waiting
    ///
    /// Fails if the channel is closed (client disconnecting) or the
    /// client has fallen a full queue behind.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::QueueFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Get the display name for this connection
    ///
    /// Returns the user name if authenticated, otherwise "anonymous".
    pub fn display_name(&self) -> &str {
        self.user.as_ref().map(|u| u.0.as_str()).unwrap_or("anonymous")
    }

    pub fn is_joined(&self, room_id: &RoomId) -> bool {
        self.rooms.contains(room_id)
    }
}
