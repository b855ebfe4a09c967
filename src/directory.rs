//! Room directory
//!
//! Maps room ids to their subscriber sets. Rooms are created on first
//! join and dropped as soon as the last subscriber leaves.
//!
//! Mutation is crate-private: callers go through
//! [`ConnectionRegistry`](crate::registry::ConnectionRegistry), which keeps
//! each connection's joined-room set in step with the directory.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::room::Room;
use crate::types::{ConnectionId, RoomId};

/// Result of a join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The room did not exist before this join
    pub created: bool,
    /// The connection was not already subscribed
    pub added: bool,
}

/// Result of a leave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The connection was subscribed and has been removed
    pub removed: bool,
    /// The room became empty and was deleted
    pub deleted: bool,
}

#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomId, Room>,
    rooms_created: u64,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection, creating the room if absent
    pub(crate) fn join(&mut self, room_id: &RoomId, connection_id: ConnectionId) -> JoinOutcome {
        let mut created = false;
        let room = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            created = true;
            Room::new(room_id.clone())
        });
        let added = room.add_subscriber(connection_id);

        if created {
            self.rooms_created += 1;
            debug!("Room {} created", room_id);
        }

        JoinOutcome { created, added }
    }

    /// Unsubscribe a connection, deleting the room once empty
    pub(crate) fn leave(&mut self, room_id: &RoomId, connection_id: ConnectionId) -> LeaveOutcome {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return LeaveOutcome {
                removed: false,
                deleted: false,
            };
        };

        let removed = room.remove_subscriber(connection_id);
        let deleted = room.is_empty();
        if deleted {
            self.rooms.remove(room_id);
            debug!("Room {} deleted (empty)", room_id);
        }

        LeaveOutcome { removed, deleted }
    }

    /// Snapshot of a room's subscribers (empty for an unknown room)
    pub fn subscribers(&self, room_id: &RoomId) -> HashSet<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(Room::snapshot)
            .unwrap_or_default()
    }

    pub fn contains(&self, room_id: &RoomId, connection_id: ConnectionId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|room| room.contains(connection_id))
    }

    /// Number of live rooms
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Total rooms created over the directory's lifetime
    pub fn rooms_created(&self) -> u64 {
        self.rooms_created
    }
}
