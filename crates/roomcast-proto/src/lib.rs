//! Roomcast wire protocol.
//!
//! Every message on the wire is a JSON text frame shaped as
//! `{"type": string, "payload": any}`. The [`Envelope`] type is that raw shape.
//! Decoding is type-directed: the `type` tag selects the payload schema and
//! produces a [`ClientMessage`]; outbound traffic is a [`ServerMessage`].
//!
//! # Inbound
//!
//! | type           | payload                                 |
//! |----------------|-----------------------------------------|
//! | `SET_NICKNAME` | string                                  |
//! | `JOIN_ROOM`    | string room name                        |
//! | `LEAVE_ROOM`   | string room name                        |
//! | `CHAT_MESSAGE` | `{"targetRoom": string, "message": string}` |
//!
//! # Outbound
//!
//! | type            | payload                                       |
//! |-----------------|-----------------------------------------------|
//! | `ROOM_LIST`     | array of room names                           |
//! | `SYSTEM_NOTICE` | string                                        |
//! | `NEW_MESSAGE`   | `{"room": string, "sender": string, "message": string}` |
//! | `ERROR`         | string                                        |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod envelope;
mod errors;
pub mod payloads;

pub use envelope::{Envelope, MessageType};
pub use errors::{ProtocolError, Result};
pub use payloads::{ChatMessage, ClientMessage, NewMessage, ServerMessage};
