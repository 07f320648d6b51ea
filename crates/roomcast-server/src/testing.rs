//! Connection double for unit tests inside this crate.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;
use roomcast_core::{Connection, ConnectionId, SendError};
use roomcast_proto::ServerMessage;

use crate::registry::Session;

pub(crate) struct RecordingConnection {
    id: ConnectionId,
    frames: Mutex<Vec<Arc<str>>>,
    open: AtomicBool,
    failing: AtomicBool,
}

impl RecordingConnection {
    pub(crate) fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(id),
            frames: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
            failing: AtomicBool::new(false),
        })
    }

    /// Connection plus a session bound to it. Keep the connection alive for
    /// as long as the session should be reachable.
    pub(crate) fn session(id: u64) -> (Arc<Self>, Arc<Session>) {
        let conn = Self::new(id);
        let dyn_conn: Arc<dyn Connection> = Arc::clone(&conn) as Arc<dyn Connection>;
        let session = Arc::new(Session::new(&dyn_conn));
        (conn, session)
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn received(&self) -> Vec<ServerMessage> {
        self.frames
            .lock()
            .iter()
            .map(|text| ServerMessage::decode(text).expect("server emitted invalid frame"))
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.frames.lock().clear();
    }
}

impl Connection for RecordingConnection {
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
