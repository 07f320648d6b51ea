//! Session registry.
//!
//! One [`Session`] per live connection, keyed by [`ConnectionId`]. A session
//! holds the nickname and the set of rooms the client joined; rooms hold the
//! reverse mapping, so disconnect cleanup can walk the session's own set
//! without scanning every room.
//!
//! Sessions reference their connection weakly. The transport owns the socket
//! and its lifetime; once it drops the connection every further send fails with
//! [`SendError::Closed`] instead of keeping the socket alive.

use std::{
    collections::BTreeSet,
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use parking_lot::{Mutex, RwLock};
use roomcast_core::{Connection, ConnectionId, SendError};
use roomcast_proto::{ProtocolError, ServerMessage};

use crate::{
    broadcast::{BroadcastReport, fan_out},
    server_error::DispatchError,
};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no nickname yet
    Unnamed,
    /// Nickname set; may join rooms
    Named,
    /// Disconnected; cleanup has run or is running
    Closed,
}

/// Per-connection state.
pub struct Session {
    id: ConnectionId,
    connection: Weak<dyn Connection>,
    nickname: RwLock<Option<String>>,
    rooms: Mutex<BTreeSet<String>>,
    closed: AtomicBool,
}

impl Session {
    /// Create a session for a connection the transport keeps alive.
    pub fn new(connection: &Arc<dyn Connection>) -> Self {
        Self {
            id: connection.id(),
            connection: Arc::downgrade(connection),
            nickname: RwLock::new(None),
            rooms: Mutex::new(BTreeSet::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Connection identity.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current nickname, if set.
    pub fn nickname(&self) -> Option<String> {
        self.nickname.read().clone()
    }

    /// Replace the nickname. Later notices use the new value; earlier ones are
    /// not rewritten.
    pub(crate) fn set_nickname(&self, nickname: String) {
        *self.nickname.write() = Some(nickname);
    }

    /// Lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.is_closed() {
            SessionState::Closed
        } else if self.nickname.read().is_some() {
            SessionState::Named
        } else {
            SessionState::Unnamed
        }
    }

    /// Snapshot of joined room names, sorted.
    pub fn joined_rooms(&self) -> Vec<String> {
        self.rooms.lock().iter().cloned().collect()
    }

    /// Whether this session has joined `room`.
    pub fn is_member(&self, room: &str) -> bool {
        self.rooms.lock().contains(room)
    }

    /// Record membership on the session side.
    ///
    /// `None` once the session is closed. The closed check happens under the
    /// same lock [`Self::take_rooms`] takes, so a join racing a disconnect
    /// either lands before cleanup collects the set or not at all.
    pub(crate) fn insert_room(&self, room: &str) -> Option<bool> {
        let mut rooms = self.rooms.lock();
        if self.is_closed() {
            return None;
        }
        Some(rooms.insert(room.to_string()))
    }

    pub(crate) fn remove_room(&self, room: &str) -> bool {
        self.rooms.lock().remove(room)
    }

    pub(crate) fn take_rooms(&self) -> BTreeSet<String> {
        std::mem::take(&mut *self.rooms.lock())
    }

    /// Whether the connection has closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark closed. Returns `true` only for the first caller, so disconnect
    /// cleanup runs once.
    pub(crate) fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Queue an already-encoded frame.
    pub fn deliver(&self, text: Arc<str>) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }
        let connection = self.connection.upgrade().ok_or(SendError::Closed)?;
        if !connection.is_open() {
            return Err(SendError::Closed);
        }
        connection.send(text)
    }

    /// Encode and send one message to this client.
    ///
    /// Delivery failures are logged and swallowed; the caller cannot do
    /// anything useful about a slow or departed peer. Only encoding errors
    /// propagate.
    pub fn send(&self, message: &ServerMessage) -> Result<(), ProtocolError> {
        let text: Arc<str> = Arc::from(message.encode()?);
        if let Err(e) = self.deliver(text) {
            tracing::warn!(
                connection_id = %self.id,
                message_type = %message.message_type(),
                error = %e,
                "send failed"
            );
        }
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("nickname", &*self.nickname.read())
            .field("rooms", &*self.rooms.lock())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Registry of live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<ConnectionId, Arc<Session>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for a newly opened connection.
    ///
    /// Fails with [`DispatchError::SessionAlreadyExists`] if the id is taken;
    /// the existing session is left untouched.
    pub fn create_session(
        &self,
        connection: &Arc<dyn Connection>,
    ) -> Result<Arc<Session>, DispatchError> {
        let id = connection.id();
        match self.sessions.entry(id) {
            Entry::Occupied(_) => Err(DispatchError::SessionAlreadyExists(id)),
            Entry::Vacant(slot) => {
                let session = Arc::new(Session::new(connection));
                slot.insert(Arc::clone(&session));
                tracing::debug!(connection_id = %id, "session registered");
                Ok(session)
            },
        }
    }

    /// Look up a session.
    pub fn get_session(&self, id: ConnectionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Unregister a session. `None` if it was already gone.
    pub fn remove_session(&self, id: ConnectionId) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(&id)?;
        tracing::debug!(connection_id = %id, "session unregistered");
        Some(session)
    }

    /// Whether `id` is registered.
    pub fn has_session(&self, id: ConnectionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot of every live session.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// Send `message` to every live session.
    pub fn broadcast_all(&self, message: &ServerMessage) -> Result<BroadcastReport, ProtocolError> {
        let recipients = self.snapshot();
        fan_out(&recipients, message, "all")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingConnection;

    #[test]
    fn new_session_is_unnamed() {
        let (_conn, session) = RecordingConnection::session(1);
        assert_eq!(session.state(), SessionState::Unnamed);
        assert_eq!(session.nickname(), None);

        session.set_nickname("alice".to_string());
        assert_eq!(session.state(), SessionState::Named);
        assert_eq!(session.nickname().as_deref(), Some("alice"));
    }

    #[test]
    fn close_runs_once() {
        let (_conn, session) = RecordingConnection::session(1);
        assert!(session.close());
        assert!(!session.close());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn closed_session_accepts_no_rooms() {
        let (_conn, session) = RecordingConnection::session(1);
        session.insert_room("lobby");
        session.close();

        assert_eq!(session.insert_room("other"), None);
        assert_eq!(session.take_rooms().into_iter().collect::<Vec<_>>(), vec!["lobby"]);
        assert!(session.joined_rooms().is_empty());
    }

    #[test]
    fn deliver_fails_after_connection_dropped() {
        let (conn, session) = RecordingConnection::session(1);
        drop(conn);
        assert_eq!(session.deliver(Arc::from("{}")), Err(SendError::Closed));
    }

    #[test]
    fn joined_rooms_are_sorted() {
        let (_conn, session) = RecordingConnection::session(1);
        assert_eq!(session.insert_room("b"), Some(true));
        assert_eq!(session.insert_room("a"), Some(true));
        assert_eq!(session.insert_room("a"), Some(false));
        assert_eq!(session.joined_rooms(), vec!["a".to_string(), "b".to_string()]);
        assert!(session.remove_room("a"));
        assert!(!session.is_member("a"));
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let registry = SessionRegistry::new();
        let conn: Arc<dyn Connection> = RecordingConnection::new(5);

        let first = registry.create_session(&conn).unwrap();
        first.set_nickname("alice".to_string());

        assert_eq!(
            registry.create_session(&conn).unwrap_err(),
            DispatchError::SessionAlreadyExists(ConnectionId::new(5))
        );
        let live = registry.get_session(ConnectionId::new(5)).unwrap();
        assert_eq!(live.nickname().as_deref(), Some("alice"));
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = SessionRegistry::new();
        let conn: Arc<dyn Connection> = RecordingConnection::new(5);
        registry.create_session(&conn).unwrap();

        assert!(registry.remove_session(ConnectionId::new(5)).is_some());
        assert!(registry.remove_session(ConnectionId::new(5)).is_none());
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn broadcast_all_reaches_every_session() {
        let registry = SessionRegistry::new();
        let conns: Vec<_> = (1..=3).map(RecordingConnection::new).collect();
        for conn in &conns {
            let dyn_conn: Arc<dyn Connection> = Arc::clone(conn) as Arc<dyn Connection>;
            registry.create_session(&dyn_conn).unwrap();
        }

        let report = registry.broadcast_all(&ServerMessage::RoomList(Vec::new())).unwrap();

        assert_eq!(report.delivered, 3);
        for conn in &conns {
            assert_eq!(conn.received(), vec![ServerMessage::RoomList(Vec::new())]);
        }
    }
}
