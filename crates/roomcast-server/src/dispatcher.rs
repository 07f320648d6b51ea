//! Event dispatcher.
//!
//! Ties together the session registry and the room manager. The transport
//! feeds it [`ServerEvent`]s; every event is handled synchronously on the
//! caller's task and all replies are queued on the affected connections before
//! `process_event` returns.
//!
//! Concurrent events for different connections only contend on the registry
//! shards and room member sets they actually touch. The one exception is the
//! room list: reading it and fanning it out happen under a single refresh
//! guard, so the last `ROOM_LIST` each client receives matches the registry.

use std::{fmt, sync::Arc};

use parking_lot::Mutex;
use roomcast_core::{Connection, ConnectionId};
use roomcast_proto::{ClientMessage, MessageType, ProtocolError, ServerMessage};

use crate::{
    broadcast::BroadcastReport,
    registry::{Session, SessionRegistry},
    room_manager::RoomManager,
    server_error::DispatchError,
};

/// `ERROR` reply for a tag the server does not accept.
pub const UNKNOWN_TYPE: &str = "unknown message type";
/// `ERROR` reply for an undecodable envelope or a payload of the wrong shape.
pub const INVALID_FORMAT: &str = "invalid format";
/// `ERROR` reply for any fault not caused by the request itself.
pub const INTERNAL_ERROR: &str = "internal error";
/// `ERROR` reply sent before refusing a connection over the limit.
pub const SERVER_FULL: &str = "server full";

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { max_connections: 10_000 }
    }
}

/// Events that the dispatcher processes.
///
/// These are produced by the transport (production WebSocket or simulation).
#[derive(Clone)]
pub enum ServerEvent {
    /// A connection finished its handshake
    ConnectionOpened {
        /// Outbound handle; the transport keeps the owning reference
        connection: Arc<dyn Connection>,
    },

    /// A text frame arrived
    TextReceived {
        /// Connection that sent the frame
        connection_id: ConnectionId,
        /// Frame contents
        text: String,
    },

    /// A connection closed (by peer, error, or shutdown)
    ConnectionClosed {
        /// Connection that was closed
        connection_id: ConnectionId,
        /// Reason for closure
        reason: String,
    },
}

impl fmt::Debug for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionOpened { connection } => f
                .debug_struct("ConnectionOpened")
                .field("connection_id", &connection.id())
                .finish(),
            Self::TextReceived { connection_id, text } => f
                .debug_struct("TextReceived")
                .field("connection_id", connection_id)
                .field("text", text)
                .finish(),
            Self::ConnectionClosed { connection_id, reason } => f
                .debug_struct("ConnectionClosed")
                .field("connection_id", connection_id)
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Routes client messages to the room manager and maps failures to replies.
#[derive(Debug, Default)]
pub struct Dispatcher {
    sessions: SessionRegistry,
    rooms: RoomManager,
    config: DispatcherConfig,
    /// Serializes room list snapshots with their delivery
    room_list_guard: Mutex<()>,
}

impl Dispatcher {
    /// Create a dispatcher with empty registries.
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            rooms: RoomManager::new(),
            config,
            room_list_guard: Mutex::new(()),
        }
    }

    /// Process one transport event.
    ///
    /// This is the main entry point for the dispatcher. Only
    /// `ConnectionOpened` can fail, in which case the transport must close the
    /// connection. Faults while handling a text frame are answered with an
    /// `ERROR` reply and never close the connection.
    pub fn process_event(&self, event: ServerEvent) -> Result<(), DispatchError> {
        match event {
            ServerEvent::ConnectionOpened { connection } => {
                self.handle_connection_opened(&connection)
            },
            ServerEvent::TextReceived { connection_id, text } => {
                self.handle_text_received(connection_id, &text);
                Ok(())
            },
            ServerEvent::ConnectionClosed { connection_id, reason } => {
                self.handle_connection_closed(connection_id, &reason);
                Ok(())
            },
        }
    }

    fn handle_connection_opened(&self, connection: &Arc<dyn Connection>) -> Result<(), DispatchError> {
        let connection_id = connection.id();

        // Soft limit: concurrent opens may overshoot by the number racing here
        let limit = self.config.max_connections;
        if self.sessions.session_count() >= limit {
            tracing::warn!(%connection_id, limit, "connection refused: server full");
            let text = ServerMessage::error(SERVER_FULL).encode()?;
            if let Err(e) = connection.send(Arc::from(text)) {
                tracing::debug!(%connection_id, error = %e, "server full reply not delivered");
            }
            return Err(DispatchError::CapacityExceeded { limit });
        }

        // Registering under the guard keeps the first list ahead of any refresh
        let _guard = self.room_list_guard.lock();
        let session = self.sessions.create_session(connection)?;
        tracing::debug!(%connection_id, "connection opened");

        session.send(&self.rooms.room_list())?;
        Ok(())
    }

    fn handle_text_received(&self, connection_id: ConnectionId, text: &str) {
        let Some(session) = self.sessions.get_session(connection_id) else {
            tracing::debug!(%connection_id, "text from unknown connection dropped");
            return;
        };

        if let Err(e) = self.route(&session, text) {
            self.reply_to_failure(&session, &e);
        }
    }

    fn route(&self, session: &Arc<Session>, text: &str) -> Result<(), DispatchError> {
        let message = ClientMessage::decode(text)?;
        tracing::trace!(
            connection_id = %session.id(),
            message_type = %message.message_type(),
            "routing message"
        );

        match message {
            ClientMessage::SetNickname(nickname) => self.rooms.set_nickname(session, &nickname),
            ClientMessage::JoinRoom(room) => {
                if self.rooms.join_room(session, &room)? {
                    self.broadcast_room_list()?;
                }
                Ok(())
            },
            ClientMessage::LeaveRoom(room) => {
                if self.rooms.leave_specific_room(session, &room)? {
                    self.broadcast_room_list()?;
                }
                Ok(())
            },
            ClientMessage::ChatMessage(chat) => {
                self.rooms.handle_chat_message(session, &chat)?;
                Ok(())
            },
        }
    }

    fn reply_to_failure(&self, session: &Session, err: &DispatchError) {
        let connection_id = session.id();
        let reply = match err {
            DispatchError::Protocol(ProtocolError::UnknownType(kind)) => {
                tracing::debug!(%connection_id, %kind, "unknown message type");
                Some(UNKNOWN_TYPE.to_string())
            },
            DispatchError::Protocol(ProtocolError::InvalidPayload {
                message_type: MessageType::ChatMessage,
                reason,
            }) => {
                tracing::warn!(%connection_id, %reason, "undecodable chat payload dropped");
                None
            },
            DispatchError::Protocol(
                ProtocolError::Malformed(_) | ProtocolError::InvalidPayload { .. },
            ) => {
                tracing::debug!(%connection_id, error = %err, "invalid format");
                Some(INVALID_FORMAT.to_string())
            },
            DispatchError::Validation(validation) => {
                tracing::debug!(%connection_id, error = %validation, "request rejected");
                Some(validation.to_string())
            },
            _ => {
                tracing::error!(%connection_id, error = %err, "message processing failed");
                Some(INTERNAL_ERROR.to_string())
            },
        };

        let Some(reason) = reply else {
            return;
        };
        if let Err(e) = session.send(&ServerMessage::error(reason)) {
            tracing::error!(%connection_id, error = %e, "error reply not sent");
        }
    }

    fn handle_connection_closed(&self, connection_id: ConnectionId, reason: &str) {
        let Some(session) = self.sessions.remove_session(connection_id) else {
            tracing::debug!(%connection_id, reason, "close for unknown connection");
            return;
        };
        tracing::debug!(%connection_id, reason, "connection closed");

        if !self.rooms.handle_disconnect(&session) {
            return;
        }
        if let Err(e) = self.broadcast_room_list() {
            tracing::error!(%connection_id, error = %e, "room list refresh failed");
        }
    }

    fn broadcast_room_list(&self) -> Result<BroadcastReport, DispatchError> {
        let _guard = self.room_list_guard.lock();
        Ok(self.sessions.broadcast_all(&self.rooms.room_list())?)
    }

    /// Session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Room manager.
    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }
}
