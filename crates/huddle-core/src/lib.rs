//! # huddle-core
//!
//! Presence tracking and event routing for the Huddle chat relay.
//!
//! - **Presence** - Registry of connected participants and their rooms
//! - **Router** - Turns client events into registry updates and deliveries
//! - **Fanout** - Send primitives the transport layer supplies
//! - **Room** / **Message** - Name rules and chat line construction
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Transport  │────▶│   Router    │────▶│   Fanout    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐
//!                     │  Presence   │
//!                     └─────────────┘
//! ```

pub mod fanout;
pub mod message;
pub mod presence;
pub mod room;
pub mod router;

pub use fanout::{ConnectionId, Fanout};
pub use presence::{Participant, PresenceRegistry, SharedRegistry};
pub use router::{Router, RouterConfig, RouterError, RouterStats};
