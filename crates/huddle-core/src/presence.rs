//! Presence registry for Huddle.
//!
//! The registry is the single source of truth for who is connected and which
//! room they occupy. Rosters and the room directory are derived from it on
//! demand and never stored.

use crate::fanout::ConnectionId;
use huddle_protocol::Member;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Registry handle shared between the server and the router.
pub type SharedRegistry = Arc<Mutex<PresenceRegistry>>;

/// A connected participant that has entered a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    /// Connection ID, the registry key.
    pub id: ConnectionId,
    /// Display name supplied at join time. Not unique.
    pub name: String,
    /// Room currently occupied.
    pub room: String,
    /// Join order, assigned on every upsert.
    #[serde(skip)]
    seq: u64,
}

impl Participant {
    /// Roster entry for this participant.
    #[must_use]
    pub fn to_member(&self) -> Member {
        Member {
            id: self.id.to_string(),
            name: self.name.clone(),
            room: self.room.clone(),
        }
    }
}

impl From<&Participant> for Member {
    fn from(participant: &Participant) -> Self {
        participant.to_member()
    }
}

/// All connected participants, keyed by connection ID.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    participants: HashMap<ConnectionId, Participant>,
    next_seq: u64,
}

impl PresenceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry behind a shared handle.
    #[must_use]
    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Number of participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Check if nobody has entered a room.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Insert a participant, or replace the existing entry for `id`.
    ///
    /// The previous entry, and with it the previous room membership, is
    /// discarded. The participant moves to the end of its new room's roster.
    pub fn upsert(
        &mut self,
        id: ConnectionId,
        name: impl Into<String>,
        room: impl Into<String>,
    ) -> Participant {
        let seq = self.next_seq;
        self.next_seq += 1;

        let participant = Participant {
            id: id.clone(),
            name: name.into(),
            room: room.into(),
            seq,
        };

        let previous = self.participants.insert(id, participant.clone());
        debug!(
            connection = %participant.id,
            room = %participant.room,
            replaced = previous.is_some(),
            "Presence: participant upserted"
        );

        participant
    }

    /// Remove the participant for `id`, if present.
    ///
    /// Removing an absent ID is a no-op, so duplicate disconnects are harmless.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<Participant> {
        let removed = self.participants.remove(id);
        if removed.is_some() {
            debug!(connection = %id, "Presence: participant removed");
        }
        removed
    }

    /// Get the participant for `id`.
    #[must_use]
    pub fn lookup(&self, id: &ConnectionId) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Participants currently in `room`, in join order.
    #[must_use]
    pub fn list_by_room(&self, room: &str) -> Vec<Participant> {
        let mut members: Vec<Participant> = self
            .participants
            .values()
            .filter(|p| p.room == room)
            .cloned()
            .collect();
        members.sort_by_key(|p| p.seq);
        members
    }

    /// Roster of `room` in wire form.
    #[must_use]
    pub fn roster(&self, room: &str) -> Vec<Member> {
        self.list_by_room(room).iter().map(Member::from).collect()
    }

    /// Distinct names of all occupied rooms.
    #[must_use]
    pub fn list_rooms(&self) -> BTreeSet<String> {
        self.participants.values().map(|p| p.room.clone()).collect()
    }

    /// Number of occupied rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.participants
            .values()
            .map(|p| p.room.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}
