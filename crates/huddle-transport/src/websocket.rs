//! WebSocket connection over axum's upgraded socket.
//!
//! Text frames are JSON, binary frames are length-prefixed MessagePack. Replies
//! use the encoding of the most recent inbound frame.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use huddle_protocol::{codec, ClientEvent, Encoded, Encoding, ServerEvent};
use std::net::SocketAddr;
use tracing::{debug, warn};

use crate::traits::{Connection, ConnectionId, TransportError};

/// A WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    socket: WebSocket,
    remote_addr: Option<SocketAddr>,
    encoding: Encoding,
    is_open: bool,
}

impl WebSocketConnection {
    /// Wrap an upgraded socket.
    #[must_use]
    pub fn new(id: ConnectionId, socket: WebSocket) -> Self {
        Self {
            id,
            socket,
            remote_addr: None,
            encoding: Encoding::default(),
            is_open: true,
        }
    }

    /// Record the peer address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn recv(&mut self) -> Result<Option<ClientEvent>, TransportError> {
        loop {
            match self.socket.recv().await {
                Some(Ok(Message::Text(text))) => {
                    self.encoding = Encoding::Json;
                    return Ok(Some(codec::decode_json(&text)?));
                }
                Some(Ok(Message::Binary(data))) => {
                    self.encoding = Encoding::MessagePack;
                    return Ok(Some(codec::decode_binary(&data)?));
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    // Pongs are answered by the socket itself.
                }
                Some(Ok(Message::Close(_))) => {
                    debug!(connection = %self.id, "Received close frame");
                    self.is_open = false;
                    return Ok(None);
                }
                Some(Err(e)) => {
                    warn!(connection = %self.id, error = %e, "WebSocket error");
                    self.is_open = false;
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    debug!(connection = %self.id, "WebSocket stream ended");
                    self.is_open = false;
                    return Ok(None);
                }
            }
        }
    }

    async fn send(&mut self, event: &ServerEvent) -> Result<usize, TransportError> {
        if !self.is_open {
            return Err(TransportError::ConnectionClosed);
        }

        let encoded = codec::encode(event, self.encoding)?;
        let size = encoded.len();
        let message = match encoded {
            Encoded::Text(text) => Message::Text(text),
            Encoded::Binary(data) => Message::Binary(data.to_vec()),
        };

        self.socket
            .send(message)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        Ok(size)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.is_open {
            return Ok(());
        }
        self.is_open = false;

        self.socket
            .send(Message::Close(None))
            .await
            .map_err(|e| TransportError::Other(format!("Failed to close: {}", e)))
    }

    fn remote_addr(&self) -> Option<String> {
        self.remote_addr.map(|addr| addr.to_string())
    }

    fn is_open(&self) -> bool {
        self.is_open
    }
}
