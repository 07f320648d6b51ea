//! Protocol error types.

use thiserror::Error;

use crate::MessageType;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while decoding or encoding envelopes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Text is not a JSON object with a string `type` field.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Envelope carries a `type` tag this protocol does not accept inbound.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// Envelope tag is known but the payload has the wrong shape.
    #[error("invalid {message_type} payload: {reason}")]
    InvalidPayload {
        /// Tag of the envelope whose payload failed to decode
        message_type: MessageType,
        /// Decoder error message
        reason: String,
    },

    /// Serializing an outbound message failed.
    #[error("encode failed: {0}")]
    Encode(String),
}

impl ProtocolError {
    /// Message type whose payload failed to decode, if this is a payload error.
    pub fn payload_type(&self) -> Option<MessageType> {
        match self {
            Self::InvalidPayload { message_type, .. } => Some(*message_type),
            _ => None,
        }
    }
}
