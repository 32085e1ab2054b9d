//! Event router for Huddle.
//!
//! The router turns connection lifecycle events and client events into
//! registry mutations plus an ordered list of deliveries. Each event runs
//! under the registry lock from its first read to its last send, so every
//! roster and directory snapshot reflects the mutation that triggered it and
//! deliveries from different events never interleave.

use crate::fanout::{ConnectionId, Fanout};
use crate::message::{
    build_message, has_joined_notice, has_left_notice, joined_room_notice, ADMIN,
    DEFAULT_TIME_FORMAT, DEFAULT_WELCOME,
};
use crate::presence::{Participant, PresenceRegistry, SharedRegistry};
use crate::room::{
    validate_display_name, validate_room_name, DEFAULT_MAX_DISPLAY_NAME_LENGTH,
    DEFAULT_MAX_ROOM_NAME_LENGTH,
};
use huddle_protocol::{ClientEvent, ServerEvent};
use std::sync::{Arc, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, trace};

/// Default maximum chat message length, in characters.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 2000;

/// Router errors.
///
/// These never reach the client. A rejected event has no effect.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    /// Invalid room name.
    #[error("Invalid room name: {0}")]
    InvalidRoom(&'static str),

    /// Invalid display name.
    #[error("Invalid display name: {0}")]
    InvalidName(&'static str),

    /// Invalid chat message.
    #[error("Invalid message: {0}")]
    InvalidMessage(&'static str),
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Author name of server notices.
    pub admin_name: String,
    /// Greeting sent on connect.
    pub welcome_message: String,
    /// strftime format of the `time` field.
    pub time_format: String,
    /// Maximum room name length, in characters.
    pub max_room_name_length: usize,
    /// Maximum display name length, in characters.
    pub max_display_name_length: usize,
    /// Maximum chat message length, in characters.
    pub max_message_length: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            admin_name: ADMIN.to_string(),
            welcome_message: DEFAULT_WELCOME.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            max_room_name_length: DEFAULT_MAX_ROOM_NAME_LENGTH,
            max_display_name_length: DEFAULT_MAX_DISPLAY_NAME_LENGTH,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }
}

/// The event router.
pub struct Router {
    /// Presence registry, shared with whoever created it.
    registry: SharedRegistry,
    /// Transport send primitives.
    fanout: Arc<dyn Fanout>,
    /// Configuration.
    config: RouterConfig,
}

impl Router {
    /// Create a new router with default configuration.
    #[must_use]
    pub fn new(registry: SharedRegistry, fanout: Arc<dyn Fanout>) -> Self {
        Self::with_config(registry, fanout, RouterConfig::default())
    }

    /// Create a new router with custom configuration.
    #[must_use]
    pub fn with_config(
        registry: SharedRegistry,
        fanout: Arc<dyn Fanout>,
        config: RouterConfig,
    ) -> Self {
        info!("Creating router with config: {:?}", config);
        Self {
            registry,
            fanout,
            config,
        }
    }

    /// The registry handle.
    #[must_use]
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Get router statistics.
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        let registry = self.lock();
        RouterStats {
            participant_count: registry.len(),
            room_count: registry.room_count(),
        }
    }

    /// Greet a newly established connection.
    pub fn connect(&self, id: &ConnectionId) {
        self.connect_with(id, || ());
    }

    /// Run `attach` and greet the connection as one unit.
    ///
    /// The transport registers the connection inside `attach`, so no
    /// broadcast from a concurrent event can reach it ahead of the welcome.
    pub fn connect_with<T>(&self, id: &ConnectionId, attach: impl FnOnce() -> T) -> T {
        let _registry = self.lock();
        let attached = attach();

        self.fanout
            .send_to(id, self.admin_notice(self.config.welcome_message.clone()));
        debug!(connection = %id, "Connected");

        attached
    }

    /// Move a connection into `room` under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or room is invalid. Nothing is mutated or
    /// sent in that case.
    pub fn enter_room(
        &self,
        id: &ConnectionId,
        name: &str,
        room: &str,
    ) -> Result<Participant, RouterError> {
        let name = name.trim();
        let room = room.trim();
        validate_display_name(name, self.config.max_display_name_length)
            .map_err(RouterError::InvalidName)?;
        validate_room_name(room, self.config.max_room_name_length)
            .map_err(RouterError::InvalidRoom)?;

        let mut registry = self.lock();
        let previous = registry.lookup(id).cloned();

        // The mover is unsubscribed first, so the notice reaches only those who stay.
        if let Some(prev) = &previous {
            self.fanout.leave_room(id, &prev.room);
            self.fanout
                .send_to_room(&prev.room, self.admin_notice(has_left_notice(name)));
        }

        let participant = registry.upsert(id.clone(), name, room);

        if let Some(prev) = &previous {
            self.fanout
                .send_to_room(&prev.room, ServerEvent::user_list(registry.roster(&prev.room)));
        }

        self.fanout.join_room(id, room);
        self.fanout
            .send_to(id, self.admin_notice(joined_room_notice(room)));
        self.fanout
            .send_to_room_except(room, id, self.admin_notice(has_joined_notice(name)));
        self.fanout
            .send_to_room(room, ServerEvent::user_list(registry.roster(room)));
        self.broadcast_directory(&registry);

        debug!(
            connection = %id,
            room = %room,
            previous_room = previous.as_ref().map(|p| p.room.as_str()),
            "Entered room"
        );

        Ok(participant)
    }

    /// Relay a chat message to the sender's room, sender included.
    ///
    /// A connection that has not entered a room is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is blank or too long.
    pub fn message(&self, id: &ConnectionId, name: &str, text: &str) -> Result<(), RouterError> {
        let registry = self.lock();
        let Some(participant) = registry.lookup(id) else {
            trace!(connection = %id, "Message outside a room ignored");
            return Ok(());
        };

        if text.trim().is_empty() {
            return Err(RouterError::InvalidMessage("Message text cannot be empty"));
        }
        if text.chars().count() > self.config.max_message_length {
            return Err(RouterError::InvalidMessage("Message text too long"));
        }

        let author = self.author(name, participant);
        let message = build_message(author, text, &self.config.time_format);
        self.fanout
            .send_to_room(&participant.room, ServerEvent::from(message));

        trace!(connection = %id, room = %participant.room, "Relayed message");
        Ok(())
    }

    /// Tell the rest of the sender's room that the sender is typing.
    ///
    /// A connection that has not entered a room is ignored.
    pub fn activity(&self, id: &ConnectionId, name: &str) {
        let registry = self.lock();
        let Some(participant) = registry.lookup(id) else {
            trace!(connection = %id, "Activity outside a room ignored");
            return;
        };

        let author = self.author(name, participant);
        self.fanout
            .send_to_room_except(&participant.room, id, ServerEvent::activity(author));
    }

    /// Forget a connection and tell its room.
    ///
    /// Returns the participant that was removed, if the connection had
    /// entered a room. Repeated calls are no-ops.
    pub fn disconnect(&self, id: &ConnectionId) -> Option<Participant> {
        let mut registry = self.lock();
        let removed = registry.remove(id);

        if let Some(participant) = &removed {
            self.fanout.leave_room(id, &participant.room);
            self.fanout.send_to_room(
                &participant.room,
                self.admin_notice(has_left_notice(&participant.name)),
            );
            self.fanout.send_to_room(
                &participant.room,
                ServerEvent::user_list(registry.roster(&participant.room)),
            );
            self.broadcast_directory(&registry);
        }

        debug!(connection = %id, was_in_room = removed.is_some(), "Disconnected");
        removed
    }

    /// Dispatch a decoded client event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event payload is invalid.
    pub fn handle(&self, id: &ConnectionId, event: ClientEvent) -> Result<(), RouterError> {
        match event {
            ClientEvent::EnterRoom { name, room } => self.enter_room(id, &name, &room).map(|_| ()),
            ClientEvent::Message { name, text } => self.message(id, &name, &text),
            ClientEvent::Activity(name) => {
                self.activity(id, &name);
                Ok(())
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, PresenceRegistry> {
        // Every operation leaves the registry consistent, so a poisoned lock is still usable.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admin_notice(&self, text: impl Into<String>) -> ServerEvent {
        build_message(self.config.admin_name.clone(), text, &self.config.time_format).into()
    }

    /// Payload name if usable, otherwise the name the participant joined with.
    fn author(&self, name: &str, participant: &Participant) -> String {
        let name = name.trim();
        if validate_display_name(name, self.config.max_display_name_length).is_ok() {
            name.to_string()
        } else {
            participant.name.clone()
        }
    }

    fn broadcast_directory(&self, registry: &PresenceRegistry) {
        self.fanout
            .send_to_all(ServerEvent::room_list(registry.list_rooms()));
    }
}

/// Router statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterStats {
    /// Number of connections that have entered a room.
    pub participant_count: usize,
    /// Number of occupied rooms.
    pub room_count: usize,
}
