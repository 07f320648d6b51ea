//! Outbound side of a client connection.
//!
//! A [`Connection`] is a handle the transport lends to the engine. Sending
//! must never block: implementations enqueue the text for a writer that owns
//! the socket and report [`SendError::Full`] or [`SendError::Closed`]
//! immediately when they cannot.

use std::{fmt, sync::Arc};

use crate::error::SendError;

/// Opaque identity of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Non-blocking outbound handle to one client.
///
/// # Invariants
///
/// - `send` returns without waiting on the network.
/// - Once `is_open` returns `false` it never returns `true` again.
pub trait Connection: Send + Sync {
    /// Identity of this connection.
    fn id(&self) -> ConnectionId;

    /// Queue one serialized frame for delivery.
    fn send(&self, text: Arc<str>) -> Result<(), SendError>;

    /// Whether the peer may still receive frames.
    fn is_open(&self) -> bool;
}
