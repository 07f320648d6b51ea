//! `SYSTEM_NOTICE` texts.

use roomcast_proto::ServerMessage;

/// Confirmation to a client that changed its nickname.
pub fn nickname_set(nickname: &str) -> ServerMessage {
    ServerMessage::notice(format!("nickname set to '{nickname}'"))
}

/// Private welcome to a client that joined a room.
pub fn welcome(room: &str) -> ServerMessage {
    ServerMessage::notice(format!("joined room '{room}'"))
}

/// Told to the other members when someone joins.
pub fn member_joined(room: &str, nickname: &str) -> ServerMessage {
    ServerMessage::notice(format!("[{room}] {nickname} joined"))
}

/// Confirmation to a client that left a room on request.
pub fn farewell(room: &str) -> ServerMessage {
    ServerMessage::notice(format!("left room '{room}'"))
}

/// Told to the remaining members when someone leaves or disconnects.
pub fn member_left(room: &str, nickname: &str) -> ServerMessage {
    ServerMessage::notice(format!("[{room}] {nickname} left"))
}
