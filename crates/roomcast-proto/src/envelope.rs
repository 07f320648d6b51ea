//! Raw `{type, payload}` envelope.
//!
//! The envelope is the outer layer of every frame. It carries no behavior: the
//! payload stays an untyped [`serde_json::Value`] until
//! [`ClientMessage::from_envelope`](crate::ClientMessage::from_envelope) picks
//! a schema based on the tag.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Every tag the protocol defines, inbound and outbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Client sets its display name
    SetNickname,
    /// Client joins (or creates) a room
    JoinRoom,
    /// Client leaves one room
    LeaveRoom,
    /// Client posts a message to a room
    ChatMessage,
    /// Server publishes the current room names
    RoomList,
    /// Server informational notice
    SystemNotice,
    /// Server fan-out of a chat message
    NewMessage,
    /// Server error reply
    Error,
}

impl MessageType {
    /// All tags, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::SetNickname,
        Self::JoinRoom,
        Self::LeaveRoom,
        Self::ChatMessage,
        Self::RoomList,
        Self::SystemNotice,
        Self::NewMessage,
        Self::Error,
    ];

    /// Wire spelling of this tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetNickname => "SET_NICKNAME",
            Self::JoinRoom => "JOIN_ROOM",
            Self::LeaveRoom => "LEAVE_ROOM",
            Self::ChatMessage => "CHAT_MESSAGE",
            Self::RoomList => "ROOM_LIST",
            Self::SystemNotice => "SYSTEM_NOTICE",
            Self::NewMessage => "NEW_MESSAGE",
            Self::Error => "ERROR",
        }
    }

    /// Parse a wire tag. Matching is exact (case-sensitive).
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }

    /// Whether clients may send this tag.
    pub fn is_inbound(self) -> bool {
        matches!(self, Self::SetNickname | Self::JoinRoom | Self::LeaveRoom | Self::ChatMessage)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire-level message: a type tag plus an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Type tag, e.g. `"JOIN_ROOM"`
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-dependent payload. Missing payloads decode as `null`.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Build an envelope from a tag and payload.
    pub fn new(kind: MessageType, payload: serde_json::Value) -> Self {
        Self { kind: kind.as_str().to_string(), payload }
    }

    /// Decode envelope text.
    ///
    /// Fails with [`ProtocolError::Malformed`] unless the text is a JSON object
    /// with a string `type` field.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Encode to JSON text.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// The parsed tag, `None` if the tag is not part of the protocol.
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::parse(&self.kind)
    }
}
