//! Recording connection double.
//!
//! `SimConnection` stores every frame the engine sends it and can be switched
//! into a failing mode to stand in for a slow or broken peer.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;
use roomcast_core::{Connection, ConnectionId, SendError};
use roomcast_proto::{MessageType, NewMessage, ServerMessage};

/// In-memory [`Connection`] that records outbound frames.
pub struct SimConnection {
    id: ConnectionId,
    frames: Mutex<Vec<Arc<str>>>,
    open: AtomicBool,
    failing: AtomicBool,
}

impl SimConnection {
    /// Open connection with the given raw id.
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(id),
            frames: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
            failing: AtomicBool::new(false),
        })
    }

    /// Type-erased handle for the dispatcher. The caller keeps `self` alive.
    pub fn handle(self: &Arc<Self>) -> Arc<dyn Connection> {
        Arc::clone(self) as Arc<dyn Connection>
    }

    /// While set, every send fails with [`SendError::Full`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Mark the peer gone; later sends fail with [`SendError::Closed`].
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Raw frames in arrival order.
    pub fn frames(&self) -> Vec<Arc<str>> {
        self.frames.lock().clone()
    }

    /// Decoded frames in arrival order. Undecodable frames are skipped and
    /// logged.
    pub fn received(&self) -> Vec<ServerMessage> {
        self.frames
            .lock()
            .iter()
            .filter_map(|text| match ServerMessage::decode(text) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::warn!(connection_id = %self.id, error = %e, "undecodable frame");
                    None
                },
            })
            .collect()
    }

    /// Decoded frames, clearing the record.
    pub fn take(&self) -> Vec<ServerMessage> {
        let messages = self.received();
        self.frames.lock().clear();
        messages
    }

    /// Forget recorded frames.
    pub fn clear(&self) {
        self.frames.lock().clear();
    }

    /// Number of recorded frames of one type.
    pub fn count(&self, message_type: MessageType) -> usize {
        self.received().iter().filter(|m| m.message_type() == message_type).count()
    }

    /// `SYSTEM_NOTICE` texts.
    pub fn notices(&self) -> Vec<String> {
        self.received()
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::SystemNotice(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// `ERROR` texts.
    pub fn errors(&self) -> Vec<String> {
        self.received()
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::Error(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// `NEW_MESSAGE` payloads.
    pub fn chat(&self) -> Vec<NewMessage> {
        self.received()
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::NewMessage(chat) => Some(chat),
                _ => None,
            })
            .collect()
    }

    /// Most recent `ROOM_LIST`.
    pub fn last_room_list(&self) -> Option<Vec<String>> {
        self.received().into_iter().rev().find_map(|m| match m {
            ServerMessage::RoomList(rooms) => Some(rooms),
            _ => None,
        })
    }
}

impl Connection for SimConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, text: Arc<str>) -> Result<(), SendError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SendError::Full);
        }
        self.frames.lock().push(text);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(message: &ServerMessage) -> Arc<str> {
        Arc::from(message.encode().unwrap())
    }

    #[test]
    fn records_and_filters() {
        let conn = SimConnection::new(1);
        conn.send(frame(&ServerMessage::RoomList(vec!["a".to_string()]))).unwrap();
        conn.send(frame(&ServerMessage::notice("hi"))).unwrap();
        conn.send(frame(&ServerMessage::RoomList(Vec::new()))).unwrap();

        assert_eq!(conn.count(MessageType::RoomList), 2);
        assert_eq!(conn.notices(), vec!["hi".to_string()]);
        assert_eq!(conn.last_room_list(), Some(Vec::new()));
    }

    #[test]
    fn failing_and_closed_modes() {
        let conn = SimConnection::new(1);
        conn.set_failing(true);
        assert_eq!(conn.send(Arc::from("{}")), Err(SendError::Full));

        conn.set_failing(false);
        conn.close();
        assert_eq!(conn.send(Arc::from("{}")), Err(SendError::Closed));
        assert!(!conn.is_open());
        assert!(conn.frames().is_empty());
    }

    #[test]
    fn take_clears() {
        let conn = SimConnection::new(1);
        conn.send(frame(&ServerMessage::notice("x"))).unwrap();
        assert_eq!(conn.take().len(), 1);
        assert!(conn.received().is_empty());
    }
}
