//! Simulation server wrapper for testing with turmoil.
//!
//! `SimServer` runs the production [`serve_connection`] path over turmoil's
//! deterministic TCP, so WebSocket framing, the writer task and the dispatcher
//! are all exercised under simulated network conditions. Connection ids come
//! from a seeded [`SimEnv`].

use std::{io, sync::Arc};

use roomcast_core::{ConnectionId, Environment};
use roomcast_server::{ConnectionConfig, Dispatcher, DispatcherConfig, serve_connection};
use turmoil::net::TcpListener;

use crate::SimEnv;

/// Simulation server for testing with turmoil.
pub struct SimServer {
    dispatcher: Arc<Dispatcher>,
    listener: TcpListener,
    connection: ConnectionConfig,
    env: SimEnv,
}

impl SimServer {
    /// Create and bind a new simulation server.
    pub async fn bind(address: &str) -> io::Result<Self> {
        Self::bind_with_config(address, DispatcherConfig::default(), SimEnv::new()).await
    }

    /// Create and bind a new simulation server with custom config.
    pub async fn bind_with_config(
        address: &str,
        config: DispatcherConfig,
        env: SimEnv,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self {
            dispatcher: Arc::new(Dispatcher::new(config)),
            listener,
            connection: ConnectionConfig::default(),
            env,
        })
    }

    /// Accept one connection and serve it on its own task.
    pub async fn accept_connection(&self) -> io::Result<ConnectionId> {
        let (stream, remote_addr) = self.listener.accept().await?;
        let connection_id = self.env.next_connection_id();
        let dispatcher = Arc::clone(&self.dispatcher);
        let config = self.connection.clone();

        tokio::spawn(async move {
            if let Err(e) =
                serve_connection(stream, remote_addr, connection_id, dispatcher, config).await
            {
                tracing::debug!(%connection_id, error = %e, "simulated connection ended");
            }
        });

        Ok(connection_id)
    }

    /// Accept connections until the simulation ends.
    pub async fn run(self) -> io::Result<()> {
        loop {
            self.accept_connection().await?;
        }
    }

    /// Shared dispatcher, for inspection.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}
