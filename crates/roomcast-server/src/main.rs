//! Roomcast server binary.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 0.0.0.0:8080, 10000 connections
//! roomcast-server
//!
//! # Config file with a CLI override
//! roomcast-server --config roomcast.toml --bind 127.0.0.1:9000
//! ```

use std::path::PathBuf;

use clap::Parser;
use roomcast_server::{
    Server,
    config::{self, Overrides},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Roomcast chat server
#[derive(Parser, Debug)]
#[command(name = "roomcast-server")]
#[command(about = "Multi-room WebSocket chat server")]
#[command(version)]
struct Args {
    /// Address to bind to [default: 0.0.0.0:8080]
    #[arg(short, long)]
    bind: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum concurrent connections [default: 10000]
    #[arg(long)]
    max_connections: Option<usize>,

    /// Largest inbound message in bytes [default: 65536]
    #[arg(long)]
    max_message_bytes: Option<usize>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let resolved = config::resolve(
        args.config.as_deref(),
        Overrides {
            bind: args.bind,
            max_connections: args.max_connections,
            max_message_bytes: args.max_message_bytes,
            log_level: args.log_level,
        },
    )?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&resolved.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Roomcast server starting");
    tracing::info!("Binding to {}", resolved.runtime.bind_address);

    let server = Server::bind(resolved.runtime).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
