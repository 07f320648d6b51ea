//! Roomcast chat server.
//!
//! Multi-room chat broadcast engine behind a WebSocket transport. Clients set
//! a nickname, join any number of named rooms, and post messages that are
//! fanned out to every member of the target room.
//!
//! # Architecture
//!
//! The engine is transport-agnostic: the [`Dispatcher`] consumes
//! [`ServerEvent`]s and writes replies through the [`Connection`] handles the
//! transport lends it. [`serve_connection`] drives one WebSocket stream against
//! a shared dispatcher and [`Server`] is the tokio accept loop around it.
//!
//! # Components
//!
//! - [`Dispatcher`]: decodes client messages, routes them, maps errors to replies
//! - [`RoomManager`]: room registry and all membership changes
//! - [`SessionRegistry`]: live sessions keyed by [`ConnectionId`]
//! - [`Room`]: one room's members and broadcast
//! - [`Server`]: production runtime (tokio TCP + tokio-tungstenite)
//! - [`SystemEnv`]: production environment (OS RNG for connection ids)
//!
//! [`Connection`]: roomcast_core::Connection
//! [`ConnectionId`]: roomcast_core::ConnectionId

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod broadcast;
pub mod config;
mod dispatcher;
mod error;
pub mod notice;
mod registry;
mod room;
mod room_manager;
mod server_error;
mod system_env;
#[cfg(test)]
mod testing;
mod transport;

use std::{future::Future, net::SocketAddr, sync::Arc};

pub use broadcast::BroadcastReport;
pub use dispatcher::{
    Dispatcher, DispatcherConfig, INTERNAL_ERROR, INVALID_FORMAT, SERVER_FULL, ServerEvent,
    UNKNOWN_TYPE,
};
pub use error::ServerError;
pub use registry::{Session, SessionRegistry, SessionState};
pub use room::Room;
pub use room_manager::{RoomManager, RoomSnapshot};
use roomcast_core::Environment;
pub use server_error::{DispatchError, ValidationError};
pub use system_env::SystemEnv;
use tokio::net::TcpListener;
pub use transport::{ConnectionConfig, MESSAGE_TOO_LARGE, WebSocketConnection, serve_connection};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080")
    pub bind_address: String,
    /// Dispatcher configuration (limits)
    pub driver: DispatcherConfig,
    /// Per-connection limits
    pub connection: ConnectionConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            driver: DispatcherConfig::default(),
            connection: ConnectionConfig::default(),
        }
    }
}

/// Production Roomcast server.
///
/// Wraps a shared [`Dispatcher`] with a TCP listener and system environment.
pub struct Server {
    /// Shared engine
    dispatcher: Arc<Dispatcher>,
    /// TCP listener
    listener: TcpListener,
    /// Per-connection limits
    connection: ConnectionConfig,
    /// Environment
    env: SystemEnv,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_address).await.map_err(|e| {
            ServerError::Config(format!("cannot bind '{}': {e}", config.bind_address))
        })?;

        Ok(Self {
            dispatcher: Arc::new(Dispatcher::new(config.driver)),
            listener,
            connection: config.connection,
            env: SystemEnv::new(),
        })
    }

    /// Run the server, accepting connections until the process exits.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("Server starting on {}", self.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Server shutting down");
                    return Ok(());
                },
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => self.spawn_connection(stream, remote_addr),
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    },
                },
            }
        }
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream, remote_addr: SocketAddr) {
        let connection_id = self.env.next_connection_id();
        let dispatcher = Arc::clone(&self.dispatcher);
        let config = self.connection.clone();

        tokio::spawn(async move {
            if let Err(e) =
                serve_connection(stream, remote_addr, connection_id, dispatcher, config).await
            {
                tracing::debug!(%connection_id, %remote_addr, error = %e, "connection ended");
            }
        });
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared dispatcher, for inspection.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}
