//! Connection registry: the live-connection table every broadcast goes
//! through.
//!
//! Uses `DashMap` for shard-level concurrency and `parking_lot::Mutex` per
//! entry for non-poisoning, fast locking. All operations are in-memory and
//! synchronous; operations on unknown connection IDs are no-ops so that
//! late events racing a disconnect are never fatal.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use cohort_common::id;

use super::events::ServerEvent;

/// Identity attached to a connection by the `authenticate` signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub display_name: String,
}

/// Per-connection state.
struct ConnectionEntry {
    identity: Option<Identity>,
    rooms: HashSet<i64>,
    tx: mpsc::UnboundedSender<Arc<ServerEvent>>,
}

/// Shared registry of all live connections.
pub struct ConnectionRegistry {
    connections: DashMap<String, Mutex<ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a new connection in the Unauthenticated state. Returns its
    /// fresh connection ID.
    pub fn register(&self, tx: mpsc::UnboundedSender<Arc<ServerEvent>>) -> String {
        let connection_id = id::prefixed_ulid(id::prefix::CONNECTION);
        self.connections.insert(
            connection_id.clone(),
            Mutex::new(ConnectionEntry {
                identity: None,
                rooms: HashSet::new(),
                tx,
            }),
        );
        connection_id
    }

    /// Attach (or overwrite) the connection's identity. Idempotent.
    pub fn authenticate(&self, connection_id: &str, user_id: i64, display_name: String) {
        if let Some(entry) = self.connections.get(connection_id) {
            entry.lock().identity = Some(Identity {
                user_id,
                display_name,
            });
        }
    }

    /// The connection's authenticated identity, if any.
    pub fn identity(&self, connection_id: &str) -> Option<Identity> {
        let entry = self.connections.get(connection_id)?;
        let identity = entry.lock().identity.clone();
        identity
    }

    /// Record room membership. Returns `true` only if the connection was
    /// not already a member (joining twice is a no-op).
    pub fn join(&self, connection_id: &str, room_id: i64) -> bool {
        match self.connections.get(connection_id) {
            Some(entry) => entry.lock().rooms.insert(room_id),
            None => false,
        }
    }

    /// Drop room membership. Returns `true` only if the connection was a
    /// member (leaving a non-joined room is a no-op).
    pub fn leave(&self, connection_id: &str, room_id: i64) -> bool {
        match self.connections.get(connection_id) {
            Some(entry) => entry.lock().rooms.remove(&room_id),
            None => false,
        }
    }

    pub fn is_member(&self, connection_id: &str, room_id: i64) -> bool {
        match self.connections.get(connection_id) {
            Some(entry) => entry.lock().rooms.contains(&room_id),
            None => false,
        }
    }

    /// Rooms the connection is currently a member of.
    pub fn rooms_of(&self, connection_id: &str) -> Vec<i64> {
        match self.connections.get(connection_id) {
            Some(entry) => entry.lock().rooms.iter().copied().collect(),
            None => Vec::new(),
        }
    }

    /// Connection IDs currently in a room, computed at call time; never
    /// contains stale entries for already-unregistered connections.
    pub fn members_of(&self, room_id: i64) -> Vec<String> {
        self.connections
            .iter()
            .filter(|entry| entry.value().lock().rooms.contains(&room_id))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Enqueue an event for one connection. Dropped silently if the
    /// connection is gone or its receiver has closed.
    pub fn send_to(&self, connection_id: &str, event: Arc<ServerEvent>) {
        if let Some(entry) = self.connections.get(connection_id) {
            let _ = entry.lock().tx.send(event);
        }
    }

    /// Fan an event out to every current member of a room, optionally
    /// excluding one connection (the originator). Membership is re-read
    /// here, never cached across suspension points, so connections that
    /// unregistered mid-operation simply miss the event.
    pub fn broadcast_to_room(&self, room_id: i64, exclude: Option<&str>, event: Arc<ServerEvent>) {
        for entry in self.connections.iter() {
            if exclude == Some(entry.key().as_str()) {
                continue;
            }
            let guard = entry.value().lock();
            if guard.rooms.contains(&room_id) {
                let _ = guard.tx.send(event.clone());
            }
        }
    }

    /// Remove the connection and release every room membership it held.
    /// Returns the identity and rooms that were released, or `None` if the
    /// connection was already gone.
    pub fn unregister(&self, connection_id: &str) -> Option<(Option<Identity>, Vec<i64>)> {
        let (_, entry) = self.connections.remove(connection_id)?;
        let entry = entry.into_inner();
        Some((entry.identity, entry.rooms.into_iter().collect()))
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
