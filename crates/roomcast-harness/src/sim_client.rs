//! In-process client driving a dispatcher directly.
//!
//! Skips the socket entirely: outbound messages become `TextReceived` events
//! and replies land in the client's [`SimConnection`].

use std::sync::Arc;

use roomcast_core::{Connection, ConnectionId};
use roomcast_proto::{ChatMessage, ClientMessage};
use roomcast_server::{DispatchError, Dispatcher, ServerEvent};

use crate::sim_connection::SimConnection;

/// One simulated client session.
pub struct SimClient {
    connection: Arc<SimConnection>,
    dispatcher: Arc<Dispatcher>,
}

impl SimClient {
    /// Open a connection with the given raw id.
    pub fn connect(dispatcher: &Arc<Dispatcher>, id: u64) -> Result<Self, DispatchError> {
        let connection = SimConnection::new(id);
        dispatcher.process_event(ServerEvent::ConnectionOpened { connection: connection.handle() })?;
        Ok(Self { connection, dispatcher: Arc::clone(dispatcher) })
    }

    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Recorded inbox.
    pub fn connection(&self) -> &Arc<SimConnection> {
        &self.connection
    }

    /// Send raw text as if it arrived on the socket.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), DispatchError> {
        self.dispatcher
            .process_event(ServerEvent::TextReceived { connection_id: self.id(), text: text.into() })
    }

    /// Encode and send a client message.
    pub fn send(&self, message: &ClientMessage) -> Result<(), DispatchError> {
        self.send_text(message.encode()?)
    }

    /// `SET_NICKNAME`.
    pub fn set_nickname(&self, nickname: &str) -> Result<(), DispatchError> {
        self.send(&ClientMessage::SetNickname(nickname.to_string()))
    }

    /// `JOIN_ROOM`.
    pub fn join(&self, room: &str) -> Result<(), DispatchError> {
        self.send(&ClientMessage::JoinRoom(room.to_string()))
    }

    /// `LEAVE_ROOM`.
    pub fn leave(&self, room: &str) -> Result<(), DispatchError> {
        self.send(&ClientMessage::LeaveRoom(room.to_string()))
    }

    /// `CHAT_MESSAGE`.
    pub fn chat(&self, room: &str, message: &str) -> Result<(), DispatchError> {
        self.send(&ClientMessage::ChatMessage(ChatMessage {
            target_room: room.to_string(),
            message: message.to_string(),
        }))
    }

    /// Close the connection and run disconnect cleanup.
    pub fn disconnect(&self) -> Result<(), DispatchError> {
        self.connection.close();
        self.dispatcher.process_event(ServerEvent::ConnectionClosed {
            connection_id: self.id(),
            reason: "client disconnected".to_string(),
        })
    }
}
