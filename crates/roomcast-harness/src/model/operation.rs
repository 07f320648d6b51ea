//! Operations for model-based testing.
//!
//! Operations represent all possible client actions. They are generated
//! randomly by proptest (or decoded by the fuzzer) and applied to both the
//! model and the real dispatcher.

use arbitrary::Arbitrary;
use roomcast_core::ConnectionId;

/// Client identifier (0-indexed).
pub type ClientId = u8;

/// Room identifier, folded into a small pool of names.
pub type ModelRoomId = u8;

/// Distinct room names operations can reach.
pub const ROOM_POOL: u8 = 4;

/// Distinct nicknames operations can reach; seed 0 of each cycle is empty.
pub const NICKNAME_POOL: u8 = 8;

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Client sets its nickname.
    SetNickname {
        /// Client performing the operation.
        client_id: ClientId,
        /// Nickname seed (see [`nickname`]).
        nickname: u8,
    },

    /// Client joins a room, creating it if absent.
    JoinRoom {
        /// Client joining.
        client_id: ClientId,
        /// Room to join.
        room_id: ModelRoomId,
    },

    /// Client leaves a room.
    LeaveRoom {
        /// Client leaving.
        client_id: ClientId,
        /// Room to leave.
        room_id: ModelRoomId,
    },

    /// Client posts to a room.
    SendChat {
        /// Client posting.
        client_id: ClientId,
        /// Target room.
        room_id: ModelRoomId,
    },

    /// Client's connection closes.
    Disconnect {
        /// Client disconnecting.
        client_id: ClientId,
    },

    /// A disconnected client opens a fresh connection under the same id.
    Reconnect {
        /// Client reconnecting.
        client_id: ClientId,
    },
}

impl Operation {
    /// Client performing the operation.
    pub fn client_id(&self) -> ClientId {
        match self {
            Self::SetNickname { client_id, .. }
            | Self::JoinRoom { client_id, .. }
            | Self::LeaveRoom { client_id, .. }
            | Self::SendChat { client_id, .. }
            | Self::Disconnect { client_id }
            | Self::Reconnect { client_id } => *client_id,
        }
    }
}

/// Observable outcome of one operation, as the acting client sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// State changed and the client was told
    Applied,
    /// Nothing happened and nothing was sent
    NoOp,
    /// `ERROR` reply with this text
    Rejected(String),
    /// Chat reached this many members
    Delivered(usize),
}

/// Room name for a model room id.
pub fn room_name(room_id: ModelRoomId) -> String {
    format!("room-{}", room_id % ROOM_POOL)
}

/// Nickname for a seed. Every [`NICKNAME_POOL`]th seed is empty.
pub fn nickname(seed: u8) -> String {
    match seed % NICKNAME_POOL {
        0 => String::new(),
        n => format!("user{n}"),
    }
}

/// Connection id the real system uses for a client.
pub fn connection_id(client_id: ClientId) -> ConnectionId {
    ConnectionId::new(u64::from(client_id) + 1)
}

/// Inverse of [`connection_id`].
pub fn client_id(connection_id: ConnectionId) -> Option<ClientId> {
    connection_id.as_u64().checked_sub(1).and_then(|raw| ClientId::try_from(raw).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for c in [0, 1, 200] {
            assert_eq!(client_id(connection_id(c)), Some(c));
        }
        assert_eq!(client_id(ConnectionId::new(0)), None);
    }

    #[test]
    fn empty_nickname_seed() {
        assert!(nickname(0).is_empty());
        assert!(nickname(NICKNAME_POOL).is_empty());
        assert_eq!(nickname(3), "user3");
    }
}
