//! Room struct definition
//!
//! Represents one topic and its current subscribers.

use std::collections::HashSet;

use crate::types::{ConnectionId, RoomId};

/// Chat room
///
/// Unordered, unique set of subscribed connections. A room only exists
/// while it has at least one subscriber.
#[derive(Debug)]
pub struct Room {
    /// Room topic
    pub id: RoomId,
    /// Subscribed connections
    subscribers: HashSet<ConnectionId>,
}

impl Room {
    /// Create a new empty room
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            subscribers: HashSet::new(),
        }
    }

    /// Add a subscriber
    ///
    /// Returns false if the connection was already subscribed.
    pub fn add_subscriber(&mut self, connection_id: ConnectionId) -> bool {
        self.subscribers.insert(connection_id)
    }

    /// Remove a subscriber
    ///
    /// Returns false if the connection wasn't in the room.
    pub fn remove_subscriber(&mut self, connection_id: ConnectionId) -> bool {
        self.subscribers.remove(&connection_id)
    }

    /// Check if a connection is in this room
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.subscribers.contains(&connection_id)
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Get the number of subscribers in the room
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Copy of the current subscriber set
    pub fn snapshot(&self) -> HashSet<ConnectionId> {
        self.subscribers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lobby() -> RoomId {
        RoomId::parse("lobby", RoomId::DEFAULT_MAX_LEN).unwrap()
    }

    #[test]
    fn test_room_creation() {
        let room = Room::new(lobby());

        assert_eq!(room.id, lobby());
        assert!(room.is_empty());
        assert_eq!(room.subscriber_count(), 0);
    }

    #[test]
    fn test_room_add_subscriber_idempotent() {
        let a = ConnectionId::new();
        let mut room = Room::new(lobby());

        assert!(room.add_subscriber(a));
        assert!(!room.add_subscriber(a));
        assert_eq!(room.subscriber_count(), 1);
        assert!(room.contains(a));
    }

    #[test]
    fn test_room_remove_subscriber() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let mut room = Room::new(lobby());
        room.add_subscriber(a);
        room.add_subscriber(b);

        assert!(room.remove_subscriber(a));
        assert!(!room.remove_subscriber(a));
        assert!(!room.contains(a));
        assert!(room.contains(b));
        assert!(!room.is_empty());

        assert!(room.remove_subscriber(b));
        assert!(room.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let a = ConnectionId::new();
        let mut room = Room::new(lobby());
        room.add_subscriber(a);

        let snapshot = room.snapshot();
        room.remove_subscriber(a);

        assert!(snapshot.contains(&a));
        assert!(room.is_empty());
    }
}
