//! Chat line construction.
//!
//! Admin notices and participant messages share one shape: author, text, and
//! a time of day stamped by the server when the line is built.

use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use huddle_protocol::ChatMessage;
use std::fmt::Write;

/// Author name of server-generated notices.
pub const ADMIN: &str = "Admin";

/// Default greeting sent on connect.
pub const DEFAULT_WELCOME: &str = "Welcome to Chat App!";

/// Default time format: `h:mm:ss AM/PM`.
pub const DEFAULT_TIME_FORMAT: &str = "%-I:%M:%S %p";

/// Check that a strftime format string is understood.
#[must_use]
pub fn is_valid_time_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Format the current local time.
///
/// Falls back to [`DEFAULT_TIME_FORMAT`] if `format` cannot be rendered.
#[must_use]
pub fn format_time(format: &str) -> String {
    let now = Local::now();
    let mut out = String::new();
    if write!(out, "{}", now.format(format)).is_err() {
        out.clear();
        let _ = write!(out, "{}", now.format(DEFAULT_TIME_FORMAT));
    }
    out
}

/// Build a chat line stamped with the current time.
#[must_use]
pub fn build_message(
    name: impl Into<String>,
    text: impl Into<String>,
    time_format: &str,
) -> ChatMessage {
    ChatMessage {
        name: name.into(),
        text: text.into(),
        time: format_time(time_format),
    }
}

/// Notice sent to a connection that just entered `room`.
#[must_use]
pub fn joined_room_notice(room: &str) -> String {
    format!("You have joined the {} chat room", room)
}

/// Notice sent to the other occupants when `name` enters.
#[must_use]
pub fn has_joined_notice(name: &str) -> String {
    format!("{} has joined the room", name)
}

/// Notice sent to the remaining occupants when `name` leaves.
#[must_use]
pub fn has_left_notice(name: &str) -> String {
    format!("{} has left the room", name)
}
