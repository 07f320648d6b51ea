//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold at
//! quiescence, whatever sequence of joins, leaves and disconnects ran.

use std::collections::BTreeSet;

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// No registered room is empty.
///
/// The last leave or disconnect removes a room in the same step that empties
/// it.
pub struct NoEmptyRooms;

impl Invariant for NoEmptyRooms {
    fn name(&self) -> &'static str {
        "NoEmptyRooms"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        match state.rooms.iter().find(|room| room.members.is_empty()) {
            Some(room) => Err(Violation {
                invariant: self.name(),
                message: format!("room '{}' (generation {}) has no members", room.name, room.generation),
            }),
            None => Ok(()),
        }
    }
}

/// Room-side and session-side membership agree.
///
/// A session lists room R iff R lists the session as a member.
pub struct MembershipSymmetry;

impl Invariant for MembershipSymmetry {
    fn name(&self) -> &'static str {
        "MembershipSymmetry"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            for member in &room.members {
                let listed = state.session(*member).is_some_and(|s| s.rooms.contains(&room.name));
                if !listed {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "room '{}' lists {} but the session does not list the room",
                            room.name, member
                        ),
                    });
                }
            }
        }

        for session in &state.sessions {
            for name in &session.rooms {
                let listed = state.room(name).is_some_and(|r| r.members.contains(&session.id));
                if !listed {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "session {} lists room '{}' but the room does not list it",
                            session.id, name
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Every room member is a registered session.
///
/// Disconnect cleanup must leave no departed session behind in any room.
pub struct MembersRegistered;

impl Invariant for MembersRegistered {
    fn name(&self) -> &'static str {
        "MembersRegistered"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for room in &state.rooms {
            if let Some(stale) = room.members.iter().find(|id| state.session(**id).is_none()) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("room '{}' holds unregistered member {}", room.name, stale),
                });
            }
        }
        Ok(())
    }
}

/// Live rooms carry distinct generations.
pub struct UniqueGenerations;

impl Invariant for UniqueGenerations {
    fn name(&self) -> &'static str {
        "UniqueGenerations"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut seen = BTreeSet::new();
        for room in &state.rooms {
            if !seen.insert(room.generation) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("generation {} reused by room '{}'", room.generation, room.name),
                });
            }
        }
        Ok(())
    }
}
