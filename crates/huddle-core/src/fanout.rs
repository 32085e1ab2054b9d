//! The boundary between the router and the transport layer.
//!
//! The router never iterates connections itself. It names a recipient set
//! (one connection, a room, a room minus one connection, everyone) and the
//! transport delivers.

use huddle_protocol::ServerEvent;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Atomic counter keeping IDs unique within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a connection ID from an existing token.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh connection ID.
    #[must_use]
    pub fn generate() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{:x}_{}", timestamp, counter))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Send primitives supplied by the transport layer.
///
/// Every send is fire-and-forget: a recipient that already dropped is the
/// transport's problem. Implementations must not block, since the router
/// calls them while holding the registry lock.
pub trait Fanout: Send + Sync {
    /// Deliver to a single connection.
    fn send_to(&self, id: &ConnectionId, event: ServerEvent);

    /// Deliver to every connection subscribed to `room`.
    fn send_to_room(&self, room: &str, event: ServerEvent);

    /// Deliver to every connection subscribed to `room` except `except`.
    fn send_to_room_except(&self, room: &str, except: &ConnectionId, event: ServerEvent);

    /// Deliver to every connection.
    fn send_to_all(&self, event: ServerEvent);

    /// Subscribe a connection to a room's deliveries.
    fn join_room(&self, id: &ConnectionId, room: &str);

    /// Unsubscribe a connection from a room's deliveries.
    fn leave_room(&self, id: &ConnectionId, room: &str);
}
