//! Connection registry
//!
//! Tracks live connections and keeps each connection's joined-room set
//! consistent with the [`RoomDirectory`]. Both sides are always updated
//! together: a connection is in a room's subscriber set iff the room is in
//! the connection's joined set.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tracing::debug;

use crate::connection::Connection;
use crate::directory::{JoinOutcome, RoomDirectory};
use crate::error::AppError;
use crate::message::ServerMessage;
use crate::types::{ConnectionId, RoomId, UserIdentity};

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and issue its id
    pub fn register(
        &mut self,
        user: Option<UserIdentity>,
        sender: mpsc::Sender<ServerMessage>,
    ) -> ConnectionId {
        let id = ConnectionId::new();
        let connection = Connection::new(id, user, sender);
        debug!("Connection {} registered as {}", id, connection.display_name());
        self.connections.insert(id, connection);
        id
    }

    /// Leave every joined room, then drop the connection
    ///
    /// Unknown ids are ignored so that racing disconnects stay harmless.
    pub fn unregister(
        &mut self,
        connection_id: ConnectionId,
        directory: &mut RoomDirectory,
    ) -> Option<Connection> {
        let mut connection = self.connections.remove(&connection_id)?;

        for room_id in connection.rooms.drain() {
            directory.leave(&room_id, connection_id);
            debug!("Connection {} left room {} on unregister", connection_id, room_id);
        }

        debug!("Connection {} unregistered", connection_id);
        Some(connection)
    }

    /// Subscribe a registered connection to a room
    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        room_id: &RoomId,
        directory: &mut RoomDirectory,
    ) -> Result<JoinOutcome, AppError> {
        let connection = self
            .connections
            .get_mut(&connection_id)
            .ok_or(AppError::UnknownConnection)?;

        connection.rooms.insert(room_id.clone());
        Ok(directory.join(room_id, connection_id))
    }

    /// Unsubscribe a connection from a room
    ///
    /// Returns false when it was not subscribed (including unknown ids).
    pub fn leave(
        &mut self,
        connection_id: ConnectionId,
        room_id: &RoomId,
        directory: &mut RoomDirectory,
    ) -> bool {
        let Some(connection) = self.connections.get_mut(&connection_id) else {
            return false;
        };

        if !connection.rooms.remove(room_id) {
            return false;
        }
        directory.leave(room_id, connection_id).removed
    }

    /// Rooms a connection has joined (empty for an unknown id)
    pub fn joined_rooms(&self, connection_id: ConnectionId) -> HashSet<RoomId> {
        self.connections
            .get(&connection_id)
            .map(|c| c.rooms.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(name: &str) -> RoomId {
        RoomId::parse(name, RoomId::DEFAULT_MAX_LEN).unwrap()
    }

    fn register(registry: &mut ConnectionRegistry) -> ConnectionId {
        let (tx, _rx) = mpsc::channel(8);
        registry.register(None, tx)
    }

    #[test]
    fn test_register_issues_unique_ids() {
        let mut registry = ConnectionRegistry::new();
        let a = register(&mut registry);
        let b = register(&mut registry);

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert!(registry.joined_rooms(a).is_empty());
    }

    #[test]
    fn test_join_updates_both_sides() {
        let mut registry = ConnectionRegistry::new();
        let mut dir = RoomDirectory::new();
        let a = register(&mut registry);
        let lobby = room("lobby");

        registry.join(a, &lobby, &mut dir).unwrap();

        assert!(registry.joined_rooms(a).contains(&lobby));
        assert!(dir.contains(&lobby, a));
    }

    #[test]
    fn test_join_unknown_connection_fails() {
        let mut registry = ConnectionRegistry::new();
        let mut dir = RoomDirectory::new();

        let result = registry.join(ConnectionId::new(), &room("lobby"), &mut dir);
        assert!(matches!(result, Err(AppError::UnknownConnection)));
        assert!(dir.is_empty());
    }

    #[test]
    fn test_leave_not_joined_is_noop() {
        let mut registry = ConnectionRegistry::new();
        let mut dir = RoomDirectory::new();
        let a = register(&mut registry);

        assert!(!registry.leave(a, &room("lobby"), &mut dir));
        assert!(!registry.leave(ConnectionId::new(), &room("lobby"), &mut dir));
    }

    #[test]
    fn test_unregister_leaves_all_rooms() {
        let mut registry = ConnectionRegistry::new();
        let mut dir = RoomDirectory::new();
        let a = register(&mut registry);
        let b = register(&mut registry);
        let lobby = room("lobby");
        let other = room("other");

        registry.join(a, &lobby, &mut dir).unwrap();
        registry.join(a, &other, &mut dir).unwrap();
        registry.join(b, &lobby, &mut dir).unwrap();

        let removed = registry.unregister(a, &mut dir).unwrap();
        assert_eq!(removed.id, a);

        assert!(!dir.contains(&lobby, a));
        assert!(dir.contains(&lobby, b));
        // `other` only had `a`
        assert_eq!(dir.len(), 1);
        assert!(registry.get(a).is_none());
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let mut registry = ConnectionRegistry::new();
        let mut dir = RoomDirectory::new();
        let a = register(&mut registry);

        assert!(registry.unregister(ConnectionId::new(), &mut dir).is_none());
        assert!(registry.unregister(a, &mut dir).is_some());
        assert!(registry.unregister(a, &mut dir).is_none());
    }
}
