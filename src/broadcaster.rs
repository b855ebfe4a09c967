//! Fan-out broadcaster
//!
//! Delivers one message to every current subscriber of a room.

use tracing::{debug, warn};

use crate::directory::RoomDirectory;
use crate::message::ServerMessage;
use crate::registry::ConnectionRegistry;
use crate::types::{ConnectionId, RoomId};

/// Delivery report for one broadcast
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanOut {
    /// Connections the message was handed to
    pub delivered: Vec<ConnectionId>,
    /// Connections whose transport was closed; they have been unsubscribed
    pub failed: Vec<ConnectionId>,
}

pub struct Broadcaster;

impl Broadcaster {
    /// Send `message` to all subscribers of `room_id` except `exclude`
    ///
    /// Works from a snapshot of the subscriber set. A failed delivery is
    /// never retried; the recipient is removed from the room instead.
    /// Subscribers missing from the registry are skipped.
    pub fn broadcast(
        registry: &mut ConnectionRegistry,
        directory: &mut RoomDirectory,
        room_id: &RoomId,
        message: &ServerMessage,
        exclude: Option<ConnectionId>,
    ) -> FanOut {
        let subscribers = directory.subscribers(room_id);
        let mut report = FanOut::default();

        for connection_id in subscribers {
            if Some(connection_id) == exclude {
                continue;
            }
            let Some(connection) = registry.get(connection_id) else {
                debug!("Dropping late delivery to {}", connection_id);
                continue;
            };

            match connection.send(message.clone()) {
                Ok(()) => report.delivered.push(connection_id),
                Err(e) => {
                    warn!(
                        "Delivery to {} in room {} failed: {}",
                        connection_id, room_id, e
                    );
                    report.failed.push(connection_id);
                }
            }
        }

        for connection_id in &report.failed {
            registry.leave(*connection_id, room_id, directory);
        }

        report
    }
}
