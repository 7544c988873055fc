//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// How long both slots must be offline before a session is swept.
    pub idle_grace: Duration,
    /// Path to the account file.
    pub accounts_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4000".parse().unwrap(),
            max_connections: 256,
            idle_grace: Duration::from_secs(300),
            accounts_path: PathBuf::from("accounts.json"),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("PADDLE_BIND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_addr),
            max_connections: std::env::var("PADDLE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            idle_grace: std::env::var("PADDLE_IDLE_GRACE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_grace),
            accounts_path: std::env::var("PADDLE_ACCOUNTS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.accounts_path),
        }
    }
}
