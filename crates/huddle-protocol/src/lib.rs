//! # huddle-protocol
//!
//! Wire protocol definitions for the Huddle chat relay.
//!
//! ## Events
//!
//! - `enterRoom` / `message` / `activity` - sent by clients
//! - `message` / `activity` / `userList` / `roomList` - sent by the server
//!
//! ## Example
//!
//! ```rust
//! use huddle_protocol::{codec, ClientEvent};
//!
//! let event = ClientEvent::enter_room("Alice", "lobby");
//!
//! let text = codec::encode_json(&event).unwrap();
//! let decoded: ClientEvent = codec::decode_json(&text).unwrap();
//! assert_eq!(event, decoded);
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode_binary, decode_json, encode, Encoded, Encoding, ProtocolError};
pub use frames::{ChatMessage, ClientEvent, EventType, Member, RoomList, ServerEvent, UserList};
