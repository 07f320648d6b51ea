//! Room Manager
//!
//! Owns the room registry and every membership change. Rooms are created
//! lazily by the first join and removed when the last member leaves, so the
//! registry never holds an empty room once an operation completes.
//!
//! Both transitions run under the registry's per-key entry guard: the join
//! inserts its member before the guard is released, and removal re-checks
//! emptiness under the guard. A join and a leave racing on the same name can
//! therefore never strand a member in a room that was just deleted.
//!
//! Lock order is registry shard, then session room set, then room membership.
//! Notices are sent after every guard is released.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use roomcast_core::ConnectionId;
use roomcast_proto::{ChatMessage, NewMessage, ServerMessage};

use crate::{
    broadcast::BroadcastReport,
    notice,
    registry::Session,
    room::Room,
    server_error::{DispatchError, ValidationError},
};

/// Why a member is leaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    /// `LEAVE_ROOM`; the leaver gets a confirmation
    Requested,
    /// Connection closed
    Disconnected,
}

/// Point-in-time view of one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    /// Room name
    pub name: String,
    /// Room instance
    pub generation: u64,
    /// Members, ascending by id
    pub members: Vec<ConnectionId>,
}

/// Registry of live rooms.
#[derive(Debug)]
pub struct RoomManager {
    rooms: DashMap<String, Arc<Room>>,
    next_generation: AtomicU64,
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomManager {
    /// Create an empty room manager.
    pub fn new() -> Self {
        Self { rooms: DashMap::new(), next_generation: AtomicU64::new(1) }
    }

    /// Set or replace the session nickname and confirm it to the caller.
    pub fn set_nickname(&self, session: &Session, nickname: &str) -> Result<(), DispatchError> {
        if nickname.is_empty() {
            return Err(ValidationError::EmptyNickname.into());
        }

        session.set_nickname(nickname.to_string());
        tracing::debug!(connection_id = %session.id(), nickname, "nickname set");
        session.send(&notice::nickname_set(nickname))?;
        Ok(())
    }

    /// Join `room_name`, creating it if absent.
    ///
    /// Returns whether this call created the room. Joining a room the session
    /// is already in is a no-op returning `false`, as is any join by a closed
    /// session.
    pub fn join_room(&self, session: &Arc<Session>, room_name: &str) -> Result<bool, DispatchError> {
        let nickname = session.nickname().ok_or(ValidationError::NicknameRequired)?;
        if room_name.is_empty() {
            return Err(ValidationError::EmptyRoomName.into());
        }

        let entry = self.rooms.entry(room_name.to_string());
        if session.insert_room(room_name) != Some(true) {
            return Ok(false);
        }
        let (room, is_new) = match entry {
            Entry::Occupied(slot) => {
                let room = Arc::clone(slot.get());
                room.join(session);
                (room, false)
            },
            Entry::Vacant(slot) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let room = Arc::new(Room::new(room_name, generation));
                room.join(session);
                slot.insert(Arc::clone(&room));
                (room, true)
            },
        };

        if is_new {
            tracing::info!(room = room_name, generation = room.generation(), "room created");
        }
        tracing::debug!(connection_id = %session.id(), room = room_name, "joined room");

        session.send(&notice::welcome(room_name))?;
        room.broadcast_except(&notice::member_joined(room_name, &nickname), session.id())?;

        Ok(is_new)
    }

    /// Leave one room on request.
    ///
    /// Returns whether the room was deleted. Leaving a room that does not
    /// exist, or that the session is not in, is a no-op; so is an empty name.
    pub fn leave_specific_room(
        &self,
        session: &Session,
        room_name: &str,
    ) -> Result<bool, DispatchError> {
        self.remove_member(session, room_name, Departure::Requested)
    }

    /// Post a chat message to its target room.
    ///
    /// The message goes to every member, sender included. `None` when the room
    /// does not exist or the sender is not a member; nothing is sent.
    pub fn handle_chat_message(
        &self,
        session: &Session,
        chat: &ChatMessage,
    ) -> Result<Option<BroadcastReport>, DispatchError> {
        let Some(room) = self.room(&chat.target_room) else {
            tracing::debug!(
                connection_id = %session.id(),
                room = %chat.target_room,
                "chat to missing room dropped"
            );
            return Ok(None);
        };
        if !room.contains(session.id()) {
            tracing::debug!(
                connection_id = %session.id(),
                room = %chat.target_room,
                "chat from non-member dropped"
            );
            return Ok(None);
        }

        let message = ServerMessage::NewMessage(NewMessage {
            room: chat.target_room.clone(),
            sender: session.nickname().unwrap_or_default(),
            message: chat.message.clone(),
        });
        Ok(Some(room.broadcast(&message)?))
    }

    /// Remove a departing session from every room it joined.
    ///
    /// Runs at most once per session; later calls return `false`. Returns
    /// whether any room was deleted.
    pub fn handle_disconnect(&self, session: &Session) -> bool {
        if !session.close() {
            return false;
        }

        let mut any_deleted = false;
        for room_name in session.take_rooms() {
            match self.remove_member(session, &room_name, Departure::Disconnected) {
                Ok(deleted) => any_deleted |= deleted,
                Err(e) => {
                    tracing::error!(
                        connection_id = %session.id(),
                        room = %room_name,
                        error = %e,
                        "disconnect cleanup failed"
                    );
                },
            }
        }

        tracing::debug!(connection_id = %session.id(), any_deleted, "session cleaned up");
        any_deleted
    }

    fn remove_member(
        &self,
        session: &Session,
        room_name: &str,
        departure: Departure,
    ) -> Result<bool, DispatchError> {
        let Some(room) = self.room(room_name) else {
            return Ok(false);
        };
        if !room.leave(session.id()) {
            return Ok(false);
        }
        session.remove_room(room_name);

        let deleted = self
            .rooms
            .remove_if(room_name, |_, current| Arc::ptr_eq(current, &room) && current.is_empty())
            .is_some();
        if deleted {
            tracing::info!(room = room_name, generation = room.generation(), "room deleted");
        }
        tracing::debug!(connection_id = %session.id(), room = room_name, ?departure, "left room");

        if departure == Departure::Requested {
            session.send(&notice::farewell(room_name))?;
        }
        let nickname = session.nickname().unwrap_or_default();
        room.broadcast(&notice::member_left(room_name, &nickname))?;

        Ok(deleted)
    }

    /// Room names, sorted.
    pub fn room_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// `ROOM_LIST` message for the current registry.
    pub fn room_list(&self) -> ServerMessage {
        ServerMessage::RoomList(self.room_names())
    }

    /// Whether a room with this name is registered.
    pub fn has_room(&self, room_name: &str) -> bool {
        self.rooms.contains_key(room_name)
    }

    /// Look up a room.
    pub fn room(&self, room_name: &str) -> Option<Arc<Room>> {
        self.rooms.get(room_name).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of registered rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Every room with its members, sorted by name.
    pub fn snapshot(&self) -> Vec<RoomSnapshot> {
        let rooms: Vec<Arc<Room>> =
            self.rooms.iter().map(|entry| Arc::clone(entry.value())).collect();
        let mut snapshot: Vec<RoomSnapshot> = rooms
            .iter()
            .map(|room| RoomSnapshot {
                name: room.name().to_string(),
                generation: room.generation(),
                members: room.member_ids(),
            })
            .collect();
        snapshot.sort_by(|a, b| a.name.cmp(&b.name));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingConnection;

    fn named(id: u64, nickname: &str) -> (Arc<RecordingConnection>, Arc<Session>) {
        let (conn, session) = RecordingConnection::session(id);
        session.set_nickname(nickname.to_string());
        (conn, session)
    }

    #[test]
    fn nickname_is_stored_verbatim_and_confirmed() {
        let manager = RoomManager::new();
        let (conn, session) = RecordingConnection::session(1);

        manager.set_nickname(&session, "  alice ").unwrap();

        assert_eq!(session.nickname().as_deref(), Some("  alice "));
        assert_eq!(conn.received(), vec![notice::nickname_set("  alice ")]);
    }

    #[test]
    fn whitespace_nickname_is_accepted() {
        let manager = RoomManager::new();
        let (conn, session) = RecordingConnection::session(1);

        manager.set_nickname(&session, "   ").unwrap();

        assert_eq!(session.nickname().as_deref(), Some("   "));
        assert_eq!(conn.received(), vec![notice::nickname_set("   ")]);
    }

    #[test]
    fn empty_nickname_is_rejected() {
        let manager = RoomManager::new();
        let (conn, session) = RecordingConnection::session(1);

        let err = manager.set_nickname(&session, "").unwrap_err();

        assert_eq!(err, DispatchError::Validation(ValidationError::EmptyNickname));
        assert_eq!(session.nickname(), None);
        assert!(conn.received().is_empty());
    }

    #[test]
    fn join_requires_nickname() {
        let manager = RoomManager::new();
        let (_conn, session) = RecordingConnection::session(1);

        let err = manager.join_room(&session, "lobby").unwrap_err();

        assert_eq!(err, DispatchError::Validation(ValidationError::NicknameRequired));
        assert!(!manager.has_room("lobby"));
    }

    #[test]
    fn first_join_creates_room() {
        let manager = RoomManager::new();
        let (conn, alice) = named(1, "alice");

        assert!(manager.join_room(&alice, "lobby").unwrap());

        assert_eq!(manager.room_names(), vec!["lobby".to_string()]);
        assert!(alice.is_member("lobby"));
        assert_eq!(conn.received(), vec![notice::welcome("lobby")]);
    }

    #[test]
    fn join_notice_goes_to_other_members() {
        let manager = RoomManager::new();
        let (c1, alice) = named(1, "alice");
        let (c2, bob) = named(2, "bob");
        manager.join_room(&alice, "lobby").unwrap();
        c1.clear();

        assert!(!manager.join_room(&bob, "lobby").unwrap());

        assert_eq!(c1.received(), vec![notice::member_joined("lobby", "bob")]);
        assert_eq!(c2.received(), vec![notice::welcome("lobby")]);
    }

    #[test]
    fn rejoin_is_silent() {
        let manager = RoomManager::new();
        let (c1, alice) = named(1, "alice");
        manager.join_room(&alice, "lobby").unwrap();
        c1.clear();

        assert!(!manager.join_room(&alice, "lobby").unwrap());
        assert!(c1.received().is_empty());
        assert_eq!(manager.room("lobby").unwrap().member_count(), 1);
    }

    #[test]
    fn last_leave_deletes_room() {
        let manager = RoomManager::new();
        let (conn, alice) = named(1, "alice");
        manager.join_room(&alice, "lobby").unwrap();
        conn.clear();

        assert!(manager.leave_specific_room(&alice, "lobby").unwrap());

        assert!(!manager.has_room("lobby"));
        assert!(!alice.is_member("lobby"));
        assert_eq!(conn.received(), vec![notice::farewell("lobby")]);
    }

    #[test]
    fn leave_of_unjoined_room_is_a_no_op() {
        let manager = RoomManager::new();
        let (_c1, alice) = named(1, "alice");
        let (c2, bob) = named(2, "bob");
        manager.join_room(&alice, "lobby").unwrap();

        assert!(!manager.leave_specific_room(&bob, "lobby").unwrap());
        assert!(!manager.leave_specific_room(&bob, "nowhere").unwrap());
        assert!(manager.has_room("lobby"));
        assert!(c2.received().is_empty());
    }

    #[test]
    fn empty_leave_is_a_silent_no_op() {
        let manager = RoomManager::new();
        let (conn, alice) = named(1, "alice");
        manager.join_room(&alice, "lobby").unwrap();
        conn.clear();

        assert_eq!(manager.leave_specific_room(&alice, ""), Ok(false));
        assert!(alice.is_member("lobby"));
        assert!(conn.received().is_empty());
    }

    #[test]
    fn padded_room_names_are_distinct_rooms() {
        let manager = RoomManager::new();
        let (c1, alice) = named(1, "alice");
        manager.join_room(&alice, "lobby").unwrap();
        c1.clear();

        assert!(manager.join_room(&alice, " lobby ").unwrap());
        assert_eq!(c1.received(), vec![notice::welcome(" lobby ")]);
        assert_eq!(manager.room_names(), vec![" lobby ".to_string(), "lobby".to_string()]);
        assert!(alice.is_member(" lobby ") && alice.is_member("lobby"));
    }

    #[test]
    fn chat_from_non_member_is_dropped() {
        let manager = RoomManager::new();
        let (c1, alice) = named(1, "alice");
        let (_c2, bob) = named(2, "bob");
        manager.join_room(&alice, "lobby").unwrap();
        c1.clear();

        let chat = ChatMessage { target_room: "lobby".to_string(), message: "hi".to_string() };
        assert_eq!(manager.handle_chat_message(&bob, &chat).unwrap(), None);
        assert!(c1.received().is_empty());
    }

    #[test]
    fn disconnect_runs_once_and_clears_every_room() {
        let manager = RoomManager::new();
        let (_c1, alice) = named(1, "alice");
        let (c2, bob) = named(2, "bob");
        manager.join_room(&alice, "a").unwrap();
        manager.join_room(&alice, "b").unwrap();
        manager.join_room(&bob, "b").unwrap();
        c2.clear();

        assert!(manager.handle_disconnect(&alice));
        assert!(!manager.handle_disconnect(&alice));

        assert_eq!(manager.room_names(), vec!["b".to_string()]);
        assert_eq!(manager.room("b").unwrap().member_ids(), vec![ConnectionId::new(2)]);
        assert_eq!(c2.received(), vec![notice::member_left("b", "alice")]);
    }

    #[test]
    fn closed_session_cannot_join() {
        let manager = RoomManager::new();
        let (_conn, alice) = named(1, "alice");
        manager.handle_disconnect(&alice);

        assert!(!manager.join_room(&alice, "lobby").unwrap());
        assert!(!manager.has_room("lobby"));
    }

    #[test]
    fn recreated_room_has_new_generation() {
        let manager = RoomManager::new();
        let (_conn, alice) = named(1, "alice");

        manager.join_room(&alice, "lobby").unwrap();
        let first = manager.room("lobby").unwrap().generation();
        manager.leave_specific_room(&alice, "lobby").unwrap();
        manager.join_room(&alice, "lobby").unwrap();

        assert_ne!(manager.room("lobby").unwrap().generation(), first);
    }
}
