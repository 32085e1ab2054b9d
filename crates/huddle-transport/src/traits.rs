//! Transport abstraction traits for Huddle.
//!
//! A `Connection` is one client's bidirectional event stream. The server loop
//! is written against this trait, not against a particular socket type.

use async_trait::async_trait;
use huddle_protocol::{ClientEvent, ServerEvent};
use thiserror::Error;

pub use huddle_core::ConnectionId;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// A frame could not be decoded or encoded. The connection is still usable.
    #[error("Protocol error: {0}")]
    Protocol(#[from] huddle_protocol::ProtocolError),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether the connection can keep going after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransportError::Protocol(_))
    }
}

/// An active client connection.
#[async_trait]
pub trait Connection: Send {
    /// Get the connection's unique identifier.
    fn id(&self) -> &ConnectionId;

    /// Receive the next event from the client.
    ///
    /// Returns `None` if the connection is closed cleanly. Must be cancel
    /// safe: the server polls it inside `select!`.
    async fn recv(&mut self) -> Result<Option<ClientEvent>, TransportError>;

    /// Send an event to the client.
    ///
    /// Returns the encoded frame size in bytes.
    async fn send(&mut self, event: &ServerEvent) -> Result<usize, TransportError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Get the remote address of the connection, if available.
    fn remote_addr(&self) -> Option<String> {
        None
    }

    /// Check if the connection is still open.
    fn is_open(&self) -> bool;
}
