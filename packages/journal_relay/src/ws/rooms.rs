//! Room Registry
//!
//! Tracks which WebSocket connections are interested in which conversation and
//! fans messages out to them. Each connection owns an unbounded outbox drained
//! by its writer task, so pushes here never wait on a socket and every
//! connection sees messages in the order they were pushed.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, mpsc};
use tracing::{debug, trace};
use uuid::Uuid;

use super::protocol::ServerMessage;

/// Opaque per-connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Result of a fan-out: how many outboxes accepted the message and how many
/// belonged to connections that have already gone away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Default)]
struct Registry {
    /// connection -> outbox
    connections: HashMap<ConnectionId, Outbox>,
    /// conversation_id -> member connections
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

impl Registry {
    fn push(&self, connection: ConnectionId, message: ServerMessage, delivery: &mut Delivery) {
        match self.connections.get(&connection) {
            Some(outbox) if outbox.send(message).is_ok() => delivery.delivered += 1,
            _ => {
                trace!(conn_id = %connection, "Dropping message for closed connection");
                delivery.dropped += 1;
            }
        }
    }
}

/// Conversation rooms shared by every WebSocket connection.
#[derive(Default)]
pub struct RoomRegistry {
    inner: RwLock<Registry>,
    /// conversation_id -> turn lock. Entries are never pruned.
    turns: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the conversation's turn lock. Whoever holds it may change the
    /// conversation and fan the change out; members then observe changes in
    /// the same order the store applied them.
    pub async fn turn(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut turns = self.turns.lock().await;
            turns.entry(conversation_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Register a new connection. It belongs to no room yet.
    pub async fn register(&self, connection: ConnectionId, outbox: Outbox) {
        let mut inner = self.inner.write().await;
        inner.connections.insert(connection, outbox);
        debug!(conn_id = %connection, "Connection registered");
    }

    /// Forget a connection and remove it from every room it joined.
    /// Returns the conversations it was a member of.
    pub async fn unregister(&self, connection: ConnectionId) -> Vec<String> {
        let mut inner = self.inner.write().await;
        inner.connections.remove(&connection);

        let mut left = Vec::new();
        inner.rooms.retain(|conversation_id, members| {
            if members.remove(&connection) {
                left.push(conversation_id.clone());
            }
            !members.is_empty()
        });
        debug!(conn_id = %connection, rooms = left.len(), "Connection unregistered");
        left
    }

    /// Add a connection to a conversation room. Joining twice is a no-op;
    /// returns whether the connection was newly added.
    pub async fn join(&self, connection: ConnectionId, conversation_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        inner
            .rooms
            .entry(conversation_id.to_string())
            .or_default()
            .insert(connection)
    }

    /// Remove a connection from one room. Returns whether it was a member.
    pub async fn leave(&self, connection: ConnectionId, conversation_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(members) = inner.rooms.get_mut(conversation_id) else {
            return false;
        };
        let removed = members.remove(&connection);
        if members.is_empty() {
            inner.rooms.remove(conversation_id);
        }
        removed
    }

    /// Deliver `message` to every member of the room, skipping `exclude`.
    pub async fn broadcast(
        &self,
        conversation_id: &str,
        message: &ServerMessage,
        exclude: Option<ConnectionId>,
    ) -> Delivery {
        let inner = self.inner.read().await;
        let mut delivery = Delivery::default();
        let Some(members) = inner.rooms.get(conversation_id) else {
            return delivery;
        };
        for &member in members {
            if Some(member) == exclude {
                continue;
            }
            inner.push(member, message.clone(), &mut delivery);
        }
        delivery
    }

    /// Deliver `message` to a single connection, regardless of room membership.
    pub async fn send_to(&self, connection: ConnectionId, message: ServerMessage) -> Delivery {
        let inner = self.inner.read().await;
        let mut delivery = Delivery::default();
        inner.push(connection, message, &mut delivery);
        delivery
    }

    pub async fn room_size(&self, conversation_id: &str) -> usize {
        let inner = self.inner.read().await;
        inner.rooms.get(conversation_id).map_or(0, HashSet::len)
    }

    /// Conversations a connection currently belongs to, sorted.
    pub async fn rooms_for(&self, connection: ConnectionId) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut rooms: Vec<String> = inner
            .rooms
            .iter()
            .filter(|(_, members)| members.contains(&connection))
            .map(|(conversation_id, _)| conversation_id.clone())
            .collect();
        rooms.sort();
        rooms
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }
}
