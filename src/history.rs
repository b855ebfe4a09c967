//! Message history collaborator
//!
//! A [`MessageStore`] receives every successfully broadcast message.
//! Appends run on a dedicated writer task so the server never waits on
//! storage, and delivery never depends on the append result.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::message::ChatMessage;
use crate::types::RoomId;

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: &ChatMessage) -> Result<(), StoreError>;
}

/// Bounded per-room history kept in memory
#[derive(Debug)]
pub struct InMemoryStore {
    limit: usize,
    rooms: Mutex<HashMap<RoomId, VecDeque<ChatMessage>>>,
}

impl InMemoryStore {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Stored messages for a room, oldest first
    pub fn recent(&self, room_id: &RoomId) -> Vec<ChatMessage> {
        let rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        rooms
            .get(room_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn append(&self, message: &ChatMessage) -> Result<(), StoreError> {
        if self.limit == 0 {
            return Ok(());
        }
        let mut rooms = self
            .rooms
            .lock()
            .map_err(|_| StoreError::Unavailable("history lock poisoned".to_string()))?;
        let log = rooms.entry(message.room_id.clone()).or_default();
        if log.len() == self.limit {
            log.pop_front();
        }
        log.push_back(message.clone());
        Ok(())
    }
}

/// Spawn the writer task and return its queue
///
/// Messages are appended in the order they were queued. The task ends
/// when every sender is dropped.
pub fn spawn_history_writer(store: Arc<dyn MessageStore>) -> mpsc::UnboundedSender<ChatMessage> {
    let (tx, mut rx) = mpsc::unbounded_channel::<ChatMessage>();

    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = store.append(&message).await {
                warn!("Failed to persist message in room {}: {}", message.room_id, e);
            }
        }
        debug!("History writer stopped");
    });

    tx
}
