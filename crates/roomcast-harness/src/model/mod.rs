//! Reference model for model-based testing.
//!
//! The model is a sequential, obviously-correct rendition of the room
//! registry. Tests apply the same [`Operation`] sequence to the model and to
//! the real dispatcher and compare results and [`ObservableState`] after every
//! step.

mod operation;
mod server;

pub use operation::{
    ClientId, ModelRoomId, NICKNAME_POOL, Operation, OperationResult, ROOM_POOL, client_id,
    connection_id, nickname, room_name,
};
pub use server::{ModelServer, ObservableState};

use crate::invariants::SystemSnapshot;

impl ObservableState {
    /// Observable state of the real system.
    ///
    /// Sessions whose connection id does not map to a [`ClientId`] are
    /// ignored.
    pub fn from_snapshot(snapshot: &SystemSnapshot) -> Self {
        let mut state = Self::default();
        for room in &snapshot.rooms {
            let members = room.members.iter().filter_map(|id| client_id(*id)).collect();
            state.rooms.insert(room.name.clone(), members);
        }
        for session in &snapshot.sessions {
            if let (Some(client), Some(nickname)) = (client_id(session.id), &session.nickname) {
                state.nicknames.insert(client, nickname.clone());
            }
        }
        state
    }
}
