//! Codec for encoding and decoding Huddle events.
//!
//! Text frames carry JSON. Binary frames carry a length-prefixed MessagePack body.

use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Maximum frame size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// Not enough data to decode frame.
    #[error("Incomplete frame: need {0} more bytes")]
    Incomplete(usize),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MessagePack encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding error.
    #[error("Decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Invalid frame data.
    #[error("Invalid frame: {0}")]
    Invalid(String),
}

/// Wire encoding of a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    /// JSON in a text frame.
    #[default]
    Json,
    /// Length-prefixed MessagePack in a binary frame.
    MessagePack,
}

/// An encoded frame ready for the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    Text(String),
    Binary(Bytes),
}

impl Encoded {
    /// Size of the encoded frame in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Encoded::Text(text) => text.len(),
            Encoded::Binary(data) => data.len(),
        }
    }

    /// Check if the encoded frame is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encode a value with the given encoding.
///
/// # Errors
///
/// Returns an error if the frame is too large or serialization fails.
pub fn encode<T: Serialize>(value: &T, encoding: Encoding) -> Result<Encoded, ProtocolError> {
    match encoding {
        Encoding::Json => encode_json(value).map(Encoded::Text),
        Encoding::MessagePack => encode_binary(value).map(Encoded::Binary),
    }
}

/// Encode a value as JSON text.
///
/// # Errors
///
/// Returns an error if the frame is too large or serialization fails.
pub fn encode_json<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    let text = serde_json::to_string(value)?;

    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(text.len()));
    }

    Ok(text)
}

/// Decode a value from JSON text.
///
/// # Errors
///
/// Returns an error if the text is too large or not a valid event.
pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(text.len()));
    }

    Ok(serde_json::from_str(text)?)
}

/// Encode a value as a binary frame.
///
/// The encoded format is:
/// - 4 bytes: Big-endian length prefix
/// - N bytes: MessagePack-encoded body (named fields)
///
/// # Errors
///
/// Returns an error if the frame is too large or encoding fails.
pub fn encode_binary<T: Serialize>(value: &T) -> Result<Bytes, ProtocolError> {
    let payload = rmp_serde::to_vec_named(value)?;

    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);

    Ok(buf.freeze())
}

/// Decode a value from a binary frame.
///
/// A binary WebSocket message holds exactly one frame, so trailing bytes are
/// rejected.
///
/// # Errors
///
/// Returns an error if the data is incomplete, too large, or invalid.
pub fn decode_binary<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.len() < LENGTH_PREFIX_SIZE {
        return Err(ProtocolError::Incomplete(LENGTH_PREFIX_SIZE - data.len()));
    }

    let length = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;

    if length > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(length));
    }

    let total_size = LENGTH_PREFIX_SIZE + length;
    if data.len() < total_size {
        return Err(ProtocolError::Incomplete(total_size - data.len()));
    }
    if data.len() > total_size {
        return Err(ProtocolError::Invalid(format!(
            "{} trailing bytes after frame",
            data.len() - total_size
        )));
    }

    Ok(rmp_serde::from_slice(&data[LENGTH_PREFIX_SIZE..total_size])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{ChatMessage, ClientEvent, ServerEvent};

    fn chat(text: &str) -> ServerEvent {
        ServerEvent::Message(ChatMessage {
            name: "Admin".into(),
            text: text.into(),
            time: "9:41:00 AM".into(),
        })
    }

    #[test]
    fn test_binary_client_events() {
        let events = vec![
            ClientEvent::enter_room("Alice", "lobby"),
            ClientEvent::message("Alice", "hi"),
            ClientEvent::activity("Alice"),
        ];

        for event in events {
            let encoded = encode_binary(&event).unwrap();
            let length = u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]);
            assert_eq!(length as usize, encoded.len() - LENGTH_PREFIX_SIZE);

            let decoded: ClientEvent = decode_binary(&encoded).unwrap();
            assert_eq!(event, decoded);
        }
    }

    #[test]
    fn test_encode_picks_frame_kind() {
        let event = chat("Welcome to Chat App!");

        match encode(&event, Encoding::Json).unwrap() {
            Encoded::Text(text) => assert!(text.contains("\"event\":\"message\"")),
            other => panic!("Expected text frame, got {:?}", other),
        }
        assert!(matches!(
            encode(&event, Encoding::MessagePack).unwrap(),
            Encoded::Binary(_)
        ));
    }

    #[test]
    fn test_decode_json_malformed() {
        let result: Result<ClientEvent, _> = decode_json("{\"event\": \"enterRoom\"");
        assert!(matches!(result, Err(ProtocolError::Json(_))));

        let result: Result<ClientEvent, _> = decode_json("not json");
        assert!(matches!(result, Err(ProtocolError::Json(_))));
    }

    #[test]
    fn test_decode_incomplete() {
        let encoded = encode_binary(&ClientEvent::activity("Alice")).unwrap();

        match decode_binary::<ClientEvent>(&encoded[..2]) {
            Err(ProtocolError::Incomplete(2)) => {}
            other => panic!("Expected Incomplete error, got {:?}", other),
        }
        match decode_binary::<ClientEvent>(&encoded[..5]) {
            Err(ProtocolError::Incomplete(_)) => {}
            other => panic!("Expected Incomplete error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut data = encode_binary(&ClientEvent::activity("Alice"))
            .unwrap()
            .to_vec();
        data.push(0);

        assert!(matches!(
            decode_binary::<ClientEvent>(&data),
            Err(ProtocolError::Invalid(_))
        ));
    }

    #[test]
    fn test_frame_too_large() {
        let event = chat(&"a".repeat(MAX_FRAME_SIZE + 1));

        match encode_binary(&event) {
            Err(ProtocolError::FrameTooLarge(_)) => {}
            other => panic!("Expected FrameTooLarge error, got {:?}", other),
        }
        match encode_json(&event) {
            Err(ProtocolError::FrameTooLarge(_)) => {}
            other => panic!("Expected FrameTooLarge error, got {:?}", other),
        }
    }
}
