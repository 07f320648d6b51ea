//! Observable engine state for invariant checking.
//!
//! Taken from a quiescent [`Dispatcher`]. Under concurrent mutation the two
//! registries are read at different instants and the snapshot may be torn.

use std::collections::BTreeSet;

use roomcast_core::ConnectionId;
use roomcast_server::{Dispatcher, RoomSnapshot};

/// Session state as seen by invariant checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Connection id
    pub id: ConnectionId,
    /// Nickname, if set
    pub nickname: Option<String>,
    /// Rooms the session believes it is in
    pub rooms: BTreeSet<String>,
}

/// Complete system state snapshot.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Registered rooms, sorted by name
    pub rooms: Vec<RoomSnapshot>,
    /// Registered sessions, sorted by id
    pub sessions: Vec<SessionSnapshot>,
}

impl SystemSnapshot {
    /// Snapshot with no rooms and no sessions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture both registries.
    pub fn from_dispatcher(dispatcher: &Dispatcher) -> Self {
        let mut sessions: Vec<SessionSnapshot> = dispatcher
            .sessions()
            .snapshot()
            .iter()
            .map(|session| SessionSnapshot {
                id: session.id(),
                nickname: session.nickname(),
                rooms: session.joined_rooms().into_iter().collect(),
            })
            .collect();
        sessions.sort_by_key(|s| s.id);

        Self { rooms: dispatcher.rooms().snapshot(), sessions }
    }

    /// Look up a session.
    pub fn session(&self, id: ConnectionId) -> Option<&SessionSnapshot> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Look up a room.
    pub fn room(&self, name: &str) -> Option<&RoomSnapshot> {
        self.rooms.iter().find(|r| r.name == name)
    }
}
