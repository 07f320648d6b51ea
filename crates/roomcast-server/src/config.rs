//! Runtime configuration, read from an optional TOML file and then overridden
//! by command-line flags.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//! log_level = "info"
//!
//! [limits]
//! max_connections = 10000
//! max_message_bytes = 65536
//! outbound_buffer = 256
//! ```
//!
//! Every key is optional. Values given on the command line win over the file.

use std::path::Path;

use serde::Deserialize;

use crate::{
    ServerRuntimeConfig, dispatcher::DispatcherConfig, error::ServerError,
    transport::ConnectionConfig,
};

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// `[server]` section
    #[serde(default)]
    pub server: ServerSection,
    /// `[limits]` section
    #[serde(default)]
    pub limits: LimitsSection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { bind: default_bind(), log_level: default_log_level() }
    }
}

/// `[limits]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsSection {
    /// Maximum concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Largest inbound text frame, in bytes
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Per-connection outbound queue depth
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_message_bytes: default_max_message_bytes(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_connections() -> usize {
    DispatcherConfig::default().max_connections
}
fn default_max_message_bytes() -> usize {
    ConnectionConfig::default().max_message_bytes
}
fn default_outbound_buffer() -> usize {
    ConnectionConfig::default().outbound_buffer
}

impl ConfigFile {
    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read config file '{}': {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// Parse config TOML text.
    pub fn parse(content: &str) -> Result<Self, ServerError> {
        toml::from_str(content).map_err(|e| ServerError::Config(format!("config parse error: {e}")))
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Listen address
    pub bind: Option<String>,
    /// Maximum concurrent connections
    pub max_connections: Option<usize>,
    /// Largest inbound text frame
    pub max_message_bytes: Option<usize>,
    /// Tracing filter
    pub log_level: Option<String>,
}

/// Fully merged configuration.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Runtime settings
    pub runtime: ServerRuntimeConfig,
    /// Tracing filter when `RUST_LOG` is unset
    pub log_level: String,
}

/// Load the optional config file, then apply CLI overrides.
pub fn resolve(config_path: Option<&Path>, overrides: Overrides) -> Result<ResolvedConfig, ServerError> {
    let file = match config_path {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };

    let runtime = ServerRuntimeConfig {
        bind_address: overrides.bind.unwrap_or(file.server.bind),
        driver: DispatcherConfig {
            max_connections: overrides.max_connections.unwrap_or(file.limits.max_connections),
        },
        connection: ConnectionConfig {
            max_message_bytes: overrides
                .max_message_bytes
                .unwrap_or(file.limits.max_message_bytes),
            outbound_buffer: file.limits.outbound_buffer,
        },
    };

    if runtime.driver.max_connections == 0 {
        return Err(ServerError::Config("max_connections must be at least 1".to_string()));
    }
    if runtime.connection.max_message_bytes == 0 {
        return Err(ServerError::Config("max_message_bytes must be at least 1".to_string()));
    }
    if runtime.connection.outbound_buffer == 0 {
        return Err(ServerError::Config("outbound_buffer must be at least 1".to_string()));
    }

    Ok(ResolvedConfig { runtime, log_level: overrides.log_level.unwrap_or(file.server.log_level) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let file = ConfigFile::parse("").unwrap();
        assert_eq!(file.server.bind, "0.0.0.0:8080");
        assert_eq!(file.limits.max_connections, 10_000);
        assert_eq!(file.limits.max_message_bytes, 64 * 1024);
        assert_eq!(file.limits.outbound_buffer, 256);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let file = ConfigFile::parse("[limits]\nmax_connections = 5\n").unwrap();
        assert_eq!(file.limits.max_connections, 5);
        assert_eq!(file.limits.outbound_buffer, 256);
        assert_eq!(file.server.log_level, "info");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ConfigFile::parse("[server]\nport = 1\n").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn overrides_win() {
        let resolved = resolve(
            None,
            Overrides {
                bind: Some("127.0.0.1:9000".to_string()),
                max_connections: Some(3),
                ..Overrides::default()
            },
        )
        .unwrap();
        assert_eq!(resolved.runtime.bind_address, "127.0.0.1:9000");
        assert_eq!(resolved.runtime.driver.max_connections, 3);
        assert_eq!(resolved.log_level, "info");
    }

    #[test]
    fn zero_limits_are_rejected() {
        let err = resolve(None, Overrides { max_connections: Some(0), ..Overrides::default() })
            .unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
