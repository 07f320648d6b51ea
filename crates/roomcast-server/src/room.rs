//! A single chat room.
//!
//! Members are held in a `BTreeMap` behind a short-lived lock. Broadcast copies
//! the member list under the lock and sends outside it, so a slow recipient
//! never blocks joins, leaves or other broadcasts on the same room.

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;
use roomcast_core::ConnectionId;
use roomcast_proto::{ProtocolError, ServerMessage};

use crate::{
    broadcast::{BroadcastReport, fan_out},
    registry::Session,
};

/// Named set of member sessions.
///
/// # Invariants
///
/// - A room held by the room manager is non-empty except transiently between
///   the last leave and its removal.
/// - `generation` is unique per room instance. A room removed and created
///   again under the same name has a different generation.
#[derive(Debug)]
pub struct Room {
    name: String,
    generation: u64,
    members: Mutex<BTreeMap<ConnectionId, Arc<Session>>>,
}

impl Room {
    /// Create an empty room.
    pub fn new(name: impl Into<String>, generation: u64) -> Self {
        Self { name: name.into(), generation, members: Mutex::new(BTreeMap::new()) }
    }

    /// Room name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance number assigned at creation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Add a member. Returns `false` if already present.
    pub fn join(&self, session: &Arc<Session>) -> bool {
        let mut members = self.members.lock();
        if members.contains_key(&session.id()) {
            return false;
        }
        members.insert(session.id(), Arc::clone(session));
        true
    }

    /// Remove a member. Returns `false` if it was not present.
    pub fn leave(&self, id: ConnectionId) -> bool {
        self.members.lock().remove(&id).is_some()
    }

    /// Whether `id` is a member.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.lock().contains_key(&id)
    }

    /// Whether the room has no members.
    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    /// Number of members.
    pub fn member_count(&self) -> usize {
        self.members.lock().len()
    }

    /// Member ids, ascending.
    pub fn member_ids(&self) -> Vec<ConnectionId> {
        self.members.lock().keys().copied().collect()
    }

    /// Send to every current member.
    pub fn broadcast(&self, message: &ServerMessage) -> Result<BroadcastReport, ProtocolError> {
        let recipients: Vec<_> = self.members.lock().values().cloned().collect();
        fan_out(&recipients, message, &self.name)
    }

    /// Send to every current member except `exclude`.
    pub fn broadcast_except(
        &self,
        message: &ServerMessage,
        exclude: ConnectionId,
    ) -> Result<BroadcastReport, ProtocolError> {
        let recipients: Vec<_> = self
            .members
            .lock()
            .iter()
            .filter(|(id, _)| **id != exclude)
            .map(|(_, session)| Arc::clone(session))
            .collect();
        fan_out(&recipients, message, &self.name)
    }
}
