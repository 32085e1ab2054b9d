//! Event types for the Huddle protocol.
//!
//! Every frame is an adjacently tagged envelope `{"event": <name>, "data": <payload>}`,
//! the shape browser chat clients already speak.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Event names, shared by both directions where the wire name coincides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    EnterRoom,
    Message,
    Activity,
    UserList,
    RoomList,
}

impl EventType {
    /// The event name as it appears on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::EnterRoom => "enterRoom",
            EventType::Message => "message",
            EventType::Activity => "activity",
            EventType::UserList => "userList",
            EventType::RoomList => "roomList",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event sent by a client.
///
/// Missing payload fields decode as empty strings; rejecting them is the
/// router's job, not the decoder's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Join a room, leaving the current one if any.
    #[serde(rename = "enterRoom")]
    EnterRoom {
        /// Display name to use in the room.
        #[serde(default)]
        name: String,
        /// Room to enter.
        #[serde(default)]
        room: String,
    },

    /// Chat message to the current room.
    #[serde(rename = "message")]
    Message {
        /// Author name.
        #[serde(default)]
        name: String,
        /// Message body.
        #[serde(default)]
        text: String,
    },

    /// Typing notification, carrying only the author name.
    #[serde(rename = "activity")]
    Activity(String),
}

impl ClientEvent {
    /// Get the event type.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            ClientEvent::EnterRoom { .. } => EventType::EnterRoom,
            ClientEvent::Message { .. } => EventType::Message,
            ClientEvent::Activity(_) => EventType::Activity,
        }
    }

    /// Create an `enterRoom` event.
    #[must_use]
    pub fn enter_room(name: impl Into<String>, room: impl Into<String>) -> Self {
        ClientEvent::EnterRoom {
            name: name.into(),
            room: room.into(),
        }
    }

    /// Create a `message` event.
    #[must_use]
    pub fn message(name: impl Into<String>, text: impl Into<String>) -> Self {
        ClientEvent::Message {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Create an `activity` event.
    #[must_use]
    pub fn activity(name: impl Into<String>) -> Self {
        ClientEvent::Activity(name.into())
    }
}

/// A chat line: admin notices and participant messages share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author name ("Admin" for server notices).
    pub name: String,
    /// Message body.
    pub text: String,
    /// Server-side formatted time of day.
    pub time: String,
}

/// One roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Connection identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Room the member occupies.
    pub room: String,
}

/// Roster of a single room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserList {
    pub users: Vec<Member>,
}

/// Directory of all occupied rooms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomList {
    pub rooms: Vec<String>,
}

/// An event sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "message")]
    Message(ChatMessage),

    #[serde(rename = "activity")]
    Activity(String),

    #[serde(rename = "userList")]
    UserList(UserList),

    #[serde(rename = "roomList")]
    RoomList(RoomList),
}

impl ServerEvent {
    /// Get the event type.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            ServerEvent::Message(_) => EventType::Message,
            ServerEvent::Activity(_) => EventType::Activity,
            ServerEvent::UserList(_) => EventType::UserList,
            ServerEvent::RoomList(_) => EventType::RoomList,
        }
    }

    /// Create an `activity` event.
    #[must_use]
    pub fn activity(name: impl Into<String>) -> Self {
        ServerEvent::Activity(name.into())
    }

    /// Create a `userList` event.
    #[must_use]
    pub fn user_list(users: Vec<Member>) -> Self {
        ServerEvent::UserList(UserList { users })
    }

    /// Create a `roomList` event.
    #[must_use]
    pub fn room_list(rooms: impl IntoIterator<Item = String>) -> Self {
        ServerEvent::RoomList(RoomList {
            rooms: rooms.into_iter().collect(),
        })
    }
}

impl From<ChatMessage> for ServerEvent {
    fn from(message: ChatMessage) -> Self {
        ServerEvent::Message(message)
    }
}
