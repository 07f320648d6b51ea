//! Server runtime error types.

use std::io;

use thiserror::Error;

use crate::server_error::DispatchError;

/// Errors that can occur in the server runtime.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, unreadable config file, etc.).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error (bind failure, handshake failure, I/O error).
    ///
    /// Fatal for the affected connection only, unless raised while binding.
    #[error("transport error: {0}")]
    Transport(String),

    /// Dispatcher refused the connection.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ServerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
