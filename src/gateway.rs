//! Socket gateway
//!
//! Transport-independent connection lifecycle. The state machine is
//! carried by the types:
//!
//! - CONNECTING: [`Gateway::connect`] authenticates and registers
//! - CONNECTED / JOINED: a live [`Session`] routes join, leave and message
//! - CLOSED: [`Session::disconnect`] consumes the session
//!
//! Each physical connection gets a fresh `Session`; there is no resume.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::auth::{Authenticator, Credentials};
use crate::config::DEFAULT_OUTBOUND_BUFFER;
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::server::{ServerCommand, ServerStats};
use crate::types::{ConnectionId, RoomId, UserIdentity};

/// Cloneable entry point shared by all connection handlers
#[derive(Clone)]
pub struct Gateway {
    cmd_tx: mpsc::Sender<ServerCommand>,
    authenticator: Arc<dyn Authenticator>,
    max_room_id_len: usize,
    outbound_buffer: usize,
}

impl Gateway {
    pub fn new(cmd_tx: mpsc::Sender<ServerCommand>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            cmd_tx,
            authenticator,
            max_room_id_len: RoomId::DEFAULT_MAX_LEN,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }

    pub fn with_max_room_id_len(mut self, max_room_id_len: usize) -> Self {
        self.max_room_id_len = max_room_id_len;
        self
    }

    pub fn with_outbound_buffer(mut self, outbound_buffer: usize) -> Self {
        self.outbound_buffer = outbound_buffer.max(1);
        self
    }

    /// Capacity transports should give each connection's outbound queue
    pub fn outbound_buffer(&self) -> usize {
        self.outbound_buffer
    }

    /// Authenticate and register a new connection
    ///
    /// `sender` is the connection's outbound queue; broadcasts for this
    /// connection are pushed onto it.
    pub async fn connect(
        &self,
        credentials: &Credentials,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<Session, AppError> {
        let user = self
            .authenticator
            .authenticate(credentials)
            .await
            .inspect_err(|e| warn!("Rejected connection: {}", e))?;

        let connection_id = request(&self.cmd_tx, |reply| ServerCommand::Connect {
            user: user.clone(),
            sender,
            reply,
        })
        .await?;

        debug!("Connection {} authenticated", connection_id);

        Ok(Session {
            id: connection_id,
            user,
            gateway: self.clone(),
        })
    }

    /// Snapshot of a room's subscribers
    pub async fn subscribers(&self, room_id: &RoomId) -> Result<HashSet<ConnectionId>, AppError> {
        request(&self.cmd_tx, |reply| ServerCommand::Subscribers {
            room_id: room_id.clone(),
            reply,
        })
        .await
    }

    pub async fn joined_rooms(
        &self,
        connection_id: ConnectionId,
    ) -> Result<HashSet<RoomId>, AppError> {
        request(&self.cmd_tx, |reply| ServerCommand::JoinedRooms {
            connection_id,
            reply,
        })
        .await
    }

    pub async fn stats(&self) -> Result<ServerStats, AppError> {
        request(&self.cmd_tx, |reply| ServerCommand::Stats { reply }).await
    }

    fn parse_room(&self, raw: String) -> Result<RoomId, AppError> {
        RoomId::parse(raw, self.max_room_id_len)
    }
}

/// A live, registered connection
pub struct Session {
    id: ConnectionId,
    user: Option<UserIdentity>,
    gateway: Gateway,
}

impl Session {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    /// Subscribe to a room (idempotent)
    pub async fn join(&self, room_id: impl Into<String>) -> Result<RoomId, AppError> {
        let room_id = self.gateway.parse_room(room_id.into())?;
        request(&self.gateway.cmd_tx, |reply| ServerCommand::Join {
            connection_id: self.id,
            room_id: room_id.clone(),
            reply,
        })
        .await??;
        Ok(room_id)
    }

    /// Unsubscribe from a room; a no-op if not joined
    pub async fn leave(&self, room_id: impl Into<String>) -> Result<RoomId, AppError> {
        let room_id = self.gateway.parse_room(room_id.into())?;
        request(&self.gateway.cmd_tx, |reply| ServerCommand::Leave {
            connection_id: self.id,
            room_id: room_id.clone(),
            reply,
        })
        .await?;
        Ok(room_id)
    }

    /// Publish to a joined room
    ///
    /// Returns the server timestamp on success. Fails with
    /// `NotSubscribed` without broadcasting if the room was not joined.
    pub async fn message(
        &self,
        room_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Result<(RoomId, DateTime<Utc>), AppError> {
        let room_id = self.gateway.parse_room(room_id.into())?;
        let sent = request(&self.gateway.cmd_tx, |reply| ServerCommand::Message {
            connection_id: self.id,
            room_id,
            payload: payload.into(),
            reply,
        })
        .await??;
        Ok((sent.room_id, sent.timestamp))
    }

    /// Leave all rooms and unregister
    ///
    /// Always succeeds; a server that is already gone has nothing to clean.
    pub async fn disconnect(self) {
        let result = request(&self.gateway.cmd_tx, |reply| ServerCommand::Disconnect {
            connection_id: self.id,
            reply,
        })
        .await;

        if result.is_err() {
            debug!("Server closed before disconnect of {}", self.id);
        }
        debug!("Connection {} closed", self.id);
    }
}

/// Send a command carrying a oneshot reply and wait for the answer
async fn request<T>(
    cmd_tx: &mpsc::Sender<ServerCommand>,
    build: impl FnOnce(oneshot::Sender<T>) -> ServerCommand,
) -> Result<T, AppError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    cmd_tx
        .send(build(reply_tx))
        .await
        .map_err(|_| AppError::ChannelSend)?;
    reply_rx.await.map_err(|_| AppError::ChannelSend)
}
