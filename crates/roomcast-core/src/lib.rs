//! Contracts between the roomcast chat engine and its runtimes.
//!
//! The engine in `roomcast-server` never owns a socket. It talks to peers
//! through the [`Connection`] trait and draws randomness from an
//! [`Environment`]. Production wires these to WebSocket writer queues and the
//! OS RNG; the simulation harness wires them to recording doubles and a seeded
//! RNG.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;

pub use connection::{Connection, ConnectionId};
pub use env::Environment;
pub use error::SendError;
