//! WebSocket transport using tokio-tungstenite.
//!
//! Each accepted stream is upgraded to a WebSocket and split into a reader and
//! a writer. The reader runs on the connection task and feeds the dispatcher;
//! the writer is its own task draining a bounded queue. The dispatcher only
//! ever sees the queue's sending half, wrapped as a [`WebSocketConnection`], so
//! a broadcast never waits on a socket.
//!
//! The stream type is generic so the same code serves tokio TCP in production
//! and turmoil TCP in simulation.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures_util::{SinkExt, StreamExt};
use roomcast_core::{Connection, ConnectionId, SendError};
use roomcast_proto::ServerMessage;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc::{self, error::TrySendError},
};
use tokio_tungstenite::tungstenite::Message;

use crate::{
    dispatcher::{Dispatcher, ServerEvent},
    error::ServerError,
};

/// `ERROR` reply for an inbound text frame over the configured size.
pub const MESSAGE_TOO_LARGE: &str = "message too large";

/// Per-connection limits.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Largest inbound text frame dispatched, in bytes
    pub max_message_bytes: usize,
    /// Frames queued for the writer before sends fail with `Full`
    pub outbound_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { max_message_bytes: 64 * 1024, outbound_buffer: 256 }
    }
}

/// Outbound handle to one WebSocket client.
///
/// Sending enqueues onto the writer task's channel with `try_send` and never
/// waits.
#[derive(Debug)]
pub struct WebSocketConnection {
    id: ConnectionId,
    outbound: mpsc::Sender<Arc<str>>,
    open: AtomicBool,
}

impl WebSocketConnection {
    /// Wrap the sending half of a writer queue.
    pub fn new(id: ConnectionId, outbound: mpsc::Sender<Arc<str>>) -> Self {
        Self { id, outbound, open: AtomicBool::new(true) }
    }

    /// Refuse further sends. Frames already queued are still written.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

impl Connection for WebSocketConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, text: Arc<str>) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::Closed);
        }
        self.outbound.try_send(text).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.outbound.is_closed()
    }
}

/// Serve one client from handshake to close.
///
/// Returns once the peer has gone and the dispatcher has cleaned up its
/// session. Returns an error if the handshake fails or the dispatcher refuses
/// the connection; in the latter case the refusal reply is flushed first.
pub async fn serve_connection<S>(
    stream: S,
    remote_addr: SocketAddr,
    connection_id: ConnectionId,
    dispatcher: Arc<Dispatcher>,
    config: ConnectionConfig,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    tracing::debug!(%connection_id, %remote_addr, "websocket handshake complete");

    let (mut sink, mut source) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<Arc<str>>(config.outbound_buffer.max(1));
    let ws_conn = Arc::new(WebSocketConnection::new(connection_id, tx));
    let connection: Arc<dyn Connection> = Arc::clone(&ws_conn) as Arc<dyn Connection>;

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = sink.send(Message::text(text.to_string())).await {
                tracing::debug!(%connection_id, error = %e, "websocket write failed");
                return;
            }
        }
        if let Err(e) = sink.close().await {
            tracing::trace!(%connection_id, error = %e, "websocket close failed");
        }
    });

    if let Err(e) =
        dispatcher.process_event(ServerEvent::ConnectionOpened { connection: Arc::clone(&connection) })
    {
        ws_conn.close();
        drop(connection);
        drop(ws_conn);
        if let Err(join) = writer.await {
            tracing::warn!(%connection_id, error = %join, "writer task failed");
        }
        return Err(e.into());
    }

    let reason = loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => {
                if text.len() > config.max_message_bytes {
                    tracing::warn!(
                        %connection_id,
                        size = text.len(),
                        limit = config.max_message_bytes,
                        "oversized message rejected"
                    );
                    reply(&connection, &ServerMessage::error(MESSAGE_TOO_LARGE));
                    continue;
                }
                let event = ServerEvent::TextReceived { connection_id, text };
                if let Err(e) = dispatcher.process_event(event) {
                    tracing::error!(%connection_id, error = %e, "text dispatch failed");
                }
            },
            Some(Ok(Message::Close(_))) | None => break "closed by peer".to_string(),
            Some(Ok(_)) => {
                // Binary frames carry nothing in this protocol; ping/pong is
                // answered by tungstenite
            },
            Some(Err(e)) => break format!("transport error: {e}"),
        }
    };

    ws_conn.close();
    dispatcher.process_event(ServerEvent::ConnectionClosed { connection_id, reason })?;

    drop(connection);
    drop(ws_conn);
    if let Err(e) = writer.await {
        tracing::warn!(%connection_id, error = %e, "writer task failed");
    }

    Ok(())
}

fn reply(connection: &Arc<dyn Connection>, message: &ServerMessage) {
    let text = match message.encode() {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(connection_id = %connection.id(), error = %e, "reply encode failed");
            return;
        },
    };
    if let Err(e) = connection.send(Arc::from(text)) {
        tracing::debug!(connection_id = %connection.id(), error = %e, "reply not delivered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_reports_full() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = WebSocketConnection::new(ConnectionId::new(1), tx);

        assert_eq!(conn.send(Arc::from("a")), Ok(()));
        assert_eq!(conn.send(Arc::from("b")), Err(SendError::Full));
    }

    #[test]
    fn dropped_writer_reports_closed() {
        let (tx, rx) = mpsc::channel(4);
        let conn = WebSocketConnection::new(ConnectionId::new(1), tx);
        drop(rx);

        assert!(!conn.is_open());
        assert_eq!(conn.send(Arc::from("a")), Err(SendError::Closed));
    }

    #[test]
    fn closed_connection_refuses_sends_but_keeps_queue() {
        let (tx, mut rx) = mpsc::channel(4);
        let conn = WebSocketConnection::new(ConnectionId::new(1), tx);

        conn.send(Arc::from("queued")).unwrap();
        conn.close();

        assert_eq!(conn.send(Arc::from("late")), Err(SendError::Closed));
        assert_eq!(rx.try_recv().unwrap().as_ref(), "queued");
    }
}
