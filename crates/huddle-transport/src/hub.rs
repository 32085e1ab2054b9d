//! In-process connection hub.
//!
//! The hub owns one unbounded outbound queue per connection plus the
//! transport-level room subscriptions, and implements the router's send
//! primitives on top of them. Events are shared as `Arc` so a broadcast is
//! built once and cloned per recipient by reference.

use dashmap::{DashMap, DashSet};
use huddle_core::{ConnectionId, Fanout};
use huddle_protocol::ServerEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Receiving end of a connection's outbound queue.
pub type Outbound = mpsc::UnboundedReceiver<Arc<ServerEvent>>;

/// Registry of live connections and their room subscriptions.
#[derive(Debug, Default)]
pub struct Hub {
    /// Outbound queues indexed by connection.
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<Arc<ServerEvent>>>,
    /// Room subscriptions (room -> connections).
    rooms: DashMap<String, DashSet<ConnectionId>>,
    /// Reverse index (connection -> rooms).
    memberships: DashMap<ConnectionId, DashSet<String>>,
}

impl Hub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return its outbound queue.
    ///
    /// Registering an ID again replaces the previous queue.
    pub fn register(&self, id: &ConnectionId) -> Outbound {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(id.clone(), tx);
        debug!(connection = %id, "Registered connection");
        rx
    }

    /// Drop a connection's queue and all of its room subscriptions.
    pub fn unregister(&self, id: &ConnectionId) {
        self.connections.remove(id);

        if let Some((_, rooms)) = self.memberships.remove(id) {
            for room in rooms.iter() {
                if let Some(members) = self.rooms.get(room.key().as_str()) {
                    members.remove(id);
                }
                self.rooms
                    .remove_if(room.key().as_str(), |_, members| members.is_empty());
            }
        }

        debug!(connection = %id, "Unregistered connection");
    }

    /// Check if a connection is registered.
    #[must_use]
    pub fn is_registered(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of rooms with at least one subscriber.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Connections subscribed to `room`.
    #[must_use]
    pub fn room_members(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().map(|id| id.key().clone()).collect())
            .unwrap_or_default()
    }

    /// Rooms a connection is subscribed to.
    #[must_use]
    pub fn connection_rooms(&self, id: &ConnectionId) -> Vec<String> {
        self.memberships
            .get(id)
            .map(|rooms| rooms.iter().map(|room| room.key().clone()).collect())
            .unwrap_or_default()
    }

    fn deliver(&self, id: &ConnectionId, event: &Arc<ServerEvent>) -> bool {
        match self.connections.get(id) {
            Some(tx) => tx.send(Arc::clone(event)).is_ok(),
            None => false,
        }
    }

    fn deliver_to_room(&self, room: &str, except: Option<&ConnectionId>, event: ServerEvent) {
        let event = Arc::new(event);
        let mut recipients = 0usize;

        if let Some(members) = self.rooms.get(room) {
            for member in members.iter() {
                if Some(member.key()) == except {
                    continue;
                }
                if self.deliver(member.key(), &event) {
                    recipients += 1;
                }
            }
        }

        trace!(room = %room, event = %event.event_type(), recipients, "Room delivery");
    }
}

impl Fanout for Hub {
    fn send_to(&self, id: &ConnectionId, event: ServerEvent) {
        let delivered = self.deliver(id, &Arc::new(event));
        trace!(connection = %id, delivered, "Direct delivery");
    }

    fn send_to_room(&self, room: &str, event: ServerEvent) {
        self.deliver_to_room(room, None, event);
    }

    fn send_to_room_except(&self, room: &str, except: &ConnectionId, event: ServerEvent) {
        self.deliver_to_room(room, Some(except), event);
    }

    fn send_to_all(&self, event: ServerEvent) {
        let event = Arc::new(event);
        let recipients = self
            .connections
            .iter()
            .filter(|entry| entry.value().send(Arc::clone(&event)).is_ok())
            .count();
        trace!(event = %event.event_type(), recipients, "Broadcast");
    }

    fn join_room(&self, id: &ConnectionId, room: &str) {
        if !self.is_registered(id) {
            trace!(connection = %id, room = %room, "Join for unregistered connection ignored");
            return;
        }

        self.rooms.entry(room.to_string()).or_default().insert(id.clone());
        self.memberships
            .entry(id.clone())
            .or_default()
            .insert(room.to_string());

        debug!(connection = %id, room = %room, "Subscribed to room");
    }

    fn leave_room(&self, id: &ConnectionId, room: &str) {
        if let Some(members) = self.rooms.get(room) {
            members.remove(id);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());

        if let Some(rooms) = self.memberships.get(id) {
            rooms.remove(room);
        }

        debug!(connection = %id, room = %room, "Unsubscribed from room");
    }
}
