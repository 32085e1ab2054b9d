//! Room and display name rules.
//!
//! Rooms exist only implicitly, while someone occupies them, so all there is
//! to a room here is what counts as an acceptable name.

/// Default maximum room name length, in characters.
pub const DEFAULT_MAX_ROOM_NAME_LENGTH: usize = 64;

/// Default maximum display name length, in characters.
pub const DEFAULT_MAX_DISPLAY_NAME_LENGTH: usize = 32;

/// Validate a room name.
///
/// Callers trim surrounding whitespace first.
///
/// # Errors
///
/// Returns an error message if the room name is invalid.
pub fn validate_room_name(name: &str, max_length: usize) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Room name cannot be empty");
    }
    if name.chars().count() > max_length {
        return Err("Room name too long");
    }
    if name.chars().any(char::is_control) {
        return Err("Room name contains invalid characters");
    }
    Ok(())
}

/// Validate a display name.
///
/// # Errors
///
/// Returns an error message if the display name is invalid.
pub fn validate_display_name(name: &str, max_length: usize) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Display name cannot be empty");
    }
    if name.chars().count() > max_length {
        return Err("Display name too long");
    }
    if name.chars().any(char::is_control) {
        return Err("Display name contains invalid characters");
    }
    Ok(())
}
