//! Delivery errors.

use thiserror::Error;

/// Why a frame could not be queued for a peer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Peer is gone (socket closed, writer exited)
    #[error("connection closed")]
    Closed,

    /// Peer's outbound queue is full
    #[error("outbound queue full")]
    Full,
}

impl SendError {
    /// Returns true if the peer may accept frames again later.
    ///
    /// A full queue drains as the writer catches up; a closed connection never
    /// reopens.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Full)
    }
}
