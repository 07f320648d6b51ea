//! Dispatch error types.
//!
//! Provides strongly-typed errors for engine operations:
//! - Session management (registration, capacity)
//! - Request validation (nickname and room name rules)
//! - Envelope decoding and encoding

use roomcast_core::ConnectionId;
use roomcast_proto::ProtocolError;
use thiserror::Error;

/// A request the engine refuses to act on.
///
/// The `Display` text is sent verbatim as the `ERROR` reply payload. State is
/// unchanged and the connection stays open.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Joining requires a nickname
    #[error("set a nickname before joining a room")]
    NicknameRequired,

    /// Nickname was the empty string
    #[error("nickname must not be empty")]
    EmptyNickname,

    /// Room name was the empty string
    #[error("room name must not be empty")]
    EmptyRoomName,
}

/// Errors that can occur while processing server events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Session already registered.
    ///
    /// The transport handed out a duplicate connection id. The new connection
    /// is refused; the live session is left untouched.
    #[error("session already exists: {0}")]
    SessionAlreadyExists(ConnectionId),

    /// Connection limit reached.
    #[error("server full: {limit} connections")]
    CapacityExceeded {
        /// Configured limit
        limit: usize,
    },

    /// Request failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Envelope decoding or encoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
