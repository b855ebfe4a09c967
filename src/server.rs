//! RoomServer Actor implementation
//!
//! The central actor that owns the connection registry and the room
//! directory. Commands are processed one at a time, so every join, leave,
//! broadcast and disconnect is atomic with respect to the others.

use std::collections::HashSet;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::broadcaster::Broadcaster;
use crate::directory::RoomDirectory;
use crate::error::AppError;
use crate::message::{ChatMessage, ServerMessage};
use crate::registry::ConnectionRegistry;
use crate::types::{ConnectionId, RoomId, UserIdentity};

/// Commands sent from sessions to the RoomServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Register an authenticated connection
    Connect {
        user: Option<UserIdentity>,
        sender: mpsc::Sender<ServerMessage>,
        reply: oneshot::Sender<ConnectionId>,
    },
    /// Leave every room and unregister
    Disconnect {
        connection_id: ConnectionId,
        reply: oneshot::Sender<()>,
    },
    /// Subscribe to a room
    Join {
        connection_id: ConnectionId,
        room_id: RoomId,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    /// Unsubscribe from a room
    Leave {
        connection_id: ConnectionId,
        room_id: RoomId,
        reply: oneshot::Sender<()>,
    },
    /// Publish to a joined room
    Message {
        connection_id: ConnectionId,
        room_id: RoomId,
        payload: String,
        reply: oneshot::Sender<Result<ChatMessage, AppError>>,
    },
    /// Snapshot of a room's subscribers
    Subscribers {
        room_id: RoomId,
        reply: oneshot::Sender<HashSet<ConnectionId>>,
    },
    /// Rooms a connection has joined
    JoinedRooms {
        connection_id: ConnectionId,
        reply: oneshot::Sender<HashSet<RoomId>>,
    },
    /// Registry and directory counters
    Stats { reply: oneshot::Sender<ServerStats> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerStats {
    pub connections: usize,
    pub rooms: usize,
    pub rooms_created: u64,
}

/// The main RoomServer actor
pub struct RoomServer {
    registry: ConnectionRegistry,
    directory: RoomDirectory,
    /// Deliver messages back to their sender as well
    echo_to_sender: bool,
    /// Queue of the history writer, if history is enabled
    history: Option<mpsc::UnboundedSender<ChatMessage>>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl RoomServer {
    /// Create a new RoomServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            directory: RoomDirectory::new(),
            echo_to_sender: false,
            history: None,
            receiver,
        }
    }

    pub fn with_echo_to_sender(mut self, echo: bool) -> Self {
        self.echo_to_sender = echo;
        self
    }

    /// Forward every broadcast message to a history writer
    pub fn with_history(mut self, history: mpsc::UnboundedSender<ChatMessage>) -> Self {
        self.history = Some(history);
        self
    }

    /// Run the RoomServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("RoomServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("RoomServer shutting down");
    }

    /// Process a single command
    ///
    /// Replies are best-effort: a caller that went away is not an error.
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect {
                user,
                sender,
                reply,
            } => {
                let _ = reply.send(self.handle_connect(user, sender));
            }
            ServerCommand::Disconnect {
                connection_id,
                reply,
            } => {
                self.handle_disconnect(connection_id);
                let _ = reply.send(());
            }
            ServerCommand::Join {
                connection_id,
                room_id,
                reply,
            } => {
                let _ = reply.send(self.handle_join(connection_id, room_id));
            }
            ServerCommand::Leave {
                connection_id,
                room_id,
                reply,
            } => {
                self.handle_leave(connection_id, room_id);
                let _ = reply.send(());
            }
            ServerCommand::Message {
                connection_id,
                room_id,
                payload,
                reply,
            } => {
                let _ = reply.send(self.handle_message(connection_id, room_id, payload));
            }
            ServerCommand::Subscribers { room_id, reply } => {
                let _ = reply.send(self.directory.subscribers(&room_id));
            }
            ServerCommand::JoinedRooms {
                connection_id,
                reply,
            } => {
                let _ = reply.send(self.registry.joined_rooms(connection_id));
            }
            ServerCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    /// Handle new connection
    fn handle_connect(
        &mut self,
        user: Option<UserIdentity>,
        sender: mpsc::Sender<ServerMessage>,
    ) -> ConnectionId {
        let connection_id = self.registry.register(user, sender);
        debug!(
            "Total connections: {}, Total rooms: {}",
            self.registry.len(),
            self.directory.len()
        );
        connection_id
    }

    /// Handle disconnection (idempotent)
    fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        if self
            .registry
            .unregister(connection_id, &mut self.directory)
            .is_none()
        {
            debug!("Disconnect for unknown connection {}", connection_id);
            return;
        }

        debug!(
            "Total connections: {}, Total rooms: {}",
            self.registry.len(),
            self.directory.len()
        );
    }

    /// Handle room join
    fn handle_join(&mut self, connection_id: ConnectionId, room_id: RoomId) -> Result<(), AppError> {
        let outcome = self
            .registry
            .join(connection_id, &room_id, &mut self.directory)?;

        if outcome.added {
            info!("Connection {} joined room {}", connection_id, room_id);
        }
        Ok(())
    }

    /// Handle voluntary room leaving
    fn handle_leave(&mut self, connection_id: ConnectionId, room_id: RoomId) {
        if self
            .registry
            .leave(connection_id, &room_id, &mut self.directory)
        {
            info!("Connection {} left room {}", connection_id, room_id);
        }
    }

    /// Handle a published message
    fn handle_message(
        &mut self,
        connection_id: ConnectionId,
        room_id: RoomId,
        payload: String,
    ) -> Result<ChatMessage, AppError> {
        let connection = self
            .registry
            .get(connection_id)
            .ok_or(AppError::UnknownConnection)?;

        if !connection.is_joined(&room_id) {
            return Err(AppError::NotSubscribed(room_id.to_string()));
        }

        let message = ChatMessage::new(room_id, connection_id, connection.user.clone(), payload);
        let exclude = (!self.echo_to_sender).then_some(connection_id);

        let report = Broadcaster::broadcast(
            &mut self.registry,
            &mut self.directory,
            &message.room_id,
            &ServerMessage::from(&message),
            exclude,
        );
        debug!(
            "Message from {} in room {}: delivered {}, failed {}",
            connection_id,
            message.room_id,
            report.delivered.len(),
            report.failed.len()
        );

        if let Some(history) = &self.history {
            if history.send(message.clone()).is_err() {
                warn!("History writer closed, message not persisted");
            }
        }

        Ok(message)
    }

    fn stats(&self) -> ServerStats {
        ServerStats {
            connections: self.registry.len(),
            rooms: self.directory.len(),
            rooms_created: self.directory.rooms_created(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lobby() -> RoomId {
        RoomId::parse("lobby", RoomId::DEFAULT_MAX_LEN).unwrap()
    }

    fn connect(server: &mut RoomServer) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(8);
        (server.handle_connect(None, tx), rx)
    }

    fn server() -> RoomServer {
        let (_tx, rx) = mpsc::channel(8);
        RoomServer::new(rx)
    }

    #[test]
    fn test_message_requires_subscription() {
        let mut server = server();
        let (a, _rx_a) = connect(&mut server);
        let (b, mut rx_b) = connect(&mut server);
        server.handle_join(b, lobby()).unwrap();

        let result = server.handle_message(a, lobby(), "hi".to_string());

        assert!(matches!(result, Err(AppError::NotSubscribed(_))));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_message_not_echoed_by_default() {
        let mut server = server();
        let (a, mut rx_a) = connect(&mut server);
        let (b, mut rx_b) = connect(&mut server);
        server.handle_join(a, lobby()).unwrap();
        server.handle_join(b, lobby()).unwrap();

        let sent = server.handle_message(a, lobby(), "hi".to_string()).unwrap();

        assert_eq!(rx_b.try_recv().unwrap(), ServerMessage::from(&sent));
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_message_echoed_when_enabled() {
        let mut server = server().with_echo_to_sender(true);
        let (a, mut rx_a) = connect(&mut server);
        server.handle_join(a, lobby()).unwrap();

        server.handle_message(a, lobby(), "hi".to_string()).unwrap();

        assert!(matches!(rx_a.try_recv(), Ok(ServerMessage::Message { .. })));
    }

    #[test]
    fn test_message_forwarded_to_history() {
        let (history_tx, mut history_rx) = mpsc::unbounded_channel();
        let mut server = server().with_history(history_tx);
        let (a, _rx_a) = connect(&mut server);
        server.handle_join(a, lobby()).unwrap();

        server.handle_message(a, lobby(), "kept".to_string()).unwrap();

        assert_eq!(history_rx.try_recv().unwrap().payload, "kept");
    }

    #[test]
    fn test_disconnect_twice_is_harmless() {
        let mut server = server();
        let (a, _rx_a) = connect(&mut server);
        server.handle_join(a, lobby()).unwrap();

        server.handle_disconnect(a);
        server.handle_disconnect(a);

        assert_eq!(
            server.stats(),
            ServerStats {
                connections: 0,
                rooms: 0,
                rooms_created: 1
            }
        );
    }

    #[test]
    fn test_join_after_disconnect_fails() {
        let mut server = server();
        let (a, _rx_a) = connect(&mut server);
        server.handle_disconnect(a);

        assert!(matches!(
            server.handle_join(a, lobby()),
            Err(AppError::UnknownConnection)
        ));
        assert_eq!(server.stats().rooms, 0);
    }
}
