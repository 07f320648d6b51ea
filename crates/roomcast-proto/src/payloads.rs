//! Typed payloads.
//!
//! [`ClientMessage`] is the tagged union of everything a client may send and
//! [`ServerMessage`] of everything the server emits. Inbound decoding happens in
//! two steps so callers can tell a broken envelope apart from an unknown tag or
//! a payload with the wrong shape.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    Envelope, MessageType,
    errors::{ProtocolError, Result},
};

/// Chat post addressed to one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Room the message is posted to
    pub target_room: String,
    /// Message body
    pub message: String,
}

/// Chat message as fanned out to room members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Room the message was posted to
    pub room: String,
    /// Nickname of the poster
    pub sender: String,
    /// Message body
    pub message: String,
}

/// Messages a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Set the session nickname
    SetNickname(String),
    /// Join a room, creating it if absent
    JoinRoom(String),
    /// Leave one room
    LeaveRoom(String),
    /// Post to a room
    ChatMessage(ChatMessage),
}

impl ClientMessage {
    /// Decode client text: envelope first, then the tag-selected payload.
    pub fn decode(text: &str) -> Result<Self> {
        Self::from_envelope(Envelope::decode(text)?)
    }

    /// Type-directed payload decoding.
    ///
    /// Outbound-only tags are rejected as [`ProtocolError::UnknownType`] just
    /// like tags the protocol does not define.
    pub fn from_envelope(envelope: Envelope) -> Result<Self> {
        let Envelope { kind, payload } = envelope;
        match MessageType::parse(&kind) {
            Some(MessageType::SetNickname) => {
                decode_payload(MessageType::SetNickname, payload).map(Self::SetNickname)
            },
            Some(MessageType::JoinRoom) => {
                decode_payload(MessageType::JoinRoom, payload).map(Self::JoinRoom)
            },
            Some(MessageType::LeaveRoom) => {
                decode_payload(MessageType::LeaveRoom, payload).map(Self::LeaveRoom)
            },
            Some(MessageType::ChatMessage) => {
                // Some clients send the chat object pre-serialized as a string
                let payload = match payload {
                    Value::String(inner) => serde_json::from_str(&inner).map_err(|e| {
                        ProtocolError::InvalidPayload {
                            message_type: MessageType::ChatMessage,
                            reason: e.to_string(),
                        }
                    })?,
                    other => other,
                };
                decode_payload(MessageType::ChatMessage, payload).map(Self::ChatMessage)
            },
            _ => Err(ProtocolError::UnknownType(kind)),
        }
    }

    /// Tag of this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::SetNickname(_) => MessageType::SetNickname,
            Self::JoinRoom(_) => MessageType::JoinRoom,
            Self::LeaveRoom(_) => MessageType::LeaveRoom,
            Self::ChatMessage(_) => MessageType::ChatMessage,
        }
    }

    /// Wrap into a wire envelope.
    pub fn to_envelope(&self) -> Result<Envelope> {
        let payload = match self {
            Self::SetNickname(name) | Self::JoinRoom(name) | Self::LeaveRoom(name) => {
                Value::String(name.clone())
            },
            Self::ChatMessage(chat) => {
                serde_json::to_value(chat).map_err(|e| ProtocolError::Encode(e.to_string()))?
            },
        };
        Ok(Envelope::new(self.message_type(), payload))
    }

    /// Encode to JSON text.
    pub fn encode(&self) -> Result<String> {
        self.to_envelope()?.encode()
    }
}

fn decode_payload<T: DeserializeOwned>(message_type: MessageType, payload: Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| ProtocolError::InvalidPayload { message_type, reason: e.to_string() })
}

/// Messages the server emits.
///
/// Serialized adjacently tagged, so the JSON shape is exactly the envelope:
/// `{"type": "ROOM_LIST", "payload": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Current room names
    RoomList(Vec<String>),
    /// Informational notice
    SystemNotice(String),
    /// Chat fan-out
    NewMessage(NewMessage),
    /// Error reply with a human-readable reason
    Error(String),
}

impl ServerMessage {
    /// Error reply.
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error(reason.into())
    }

    /// Notice.
    pub fn notice(text: impl Into<String>) -> Self {
        Self::SystemNotice(text.into())
    }

    /// Tag of this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::RoomList(_) => MessageType::RoomList,
            Self::SystemNotice(_) => MessageType::SystemNotice,
            Self::NewMessage(_) => MessageType::NewMessage,
            Self::Error(_) => MessageType::Error,
        }
    }

    /// Encode to JSON text.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Decode server text (client side and tests).
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}
