//! Paddle Duel Server
//!
//! Binds the configured address and relays two-player paddle duels until
//! killed. Configuration comes from the environment; see
//! [`ServerConfig::from_env`].

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use paddle_duel::auth::FileAccountStore;
use paddle_duel::config::ServerConfig;
use paddle_duel::network::server::SessionServer;
use paddle_duel::{TICK_RATE, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    info!("Paddle Duel Server v{}", VERSION);
    info!("Participant tick rate: {} Hz", TICK_RATE);
    info!("Accounts: {}", config.accounts_path.display());

    let store = FileAccountStore::open(&config.accounts_path)
        .with_context(|| format!("opening account store {}", config.accounts_path.display()))?;

    let server = SessionServer::bind(config, Arc::new(store))
        .await
        .context("binding listener")?;
    server.run().await.context("accept loop failed")
}
