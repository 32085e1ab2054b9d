//! # huddle-transport
//!
//! Transport layer for the Huddle chat relay.
//!
//! - **Hub** - Per-connection outbound queues and room subscriptions,
//!   implementing the router's `Fanout` primitives
//! - **WebSocket** - `Connection` over an axum WebSocket
//!
//! ## Connection Loop
//!
//! ```rust,ignore
//! use huddle_transport::{Connection, Hub};
//!
//! async fn handle_connection(mut conn: impl Connection, hub: &Hub) {
//!     let mut outbound = hub.register(conn.id());
//!     while let Ok(Some(event)) = conn.recv().await {
//!         // Hand the event to the router
//!     }
//!     hub.unregister(conn.id());
//! }
//! ```

pub mod hub;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use hub::{Hub, Outbound};
pub use traits::{Connection, ConnectionId, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;
