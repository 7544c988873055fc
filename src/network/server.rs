//! TCP accept loop.
//!
//! Binds one listener, admits connections up to the configured cap, and
//! hands each accepted stream to its own [`handler::run_connection`] task.
//! A background sweeper drops sessions whose every participant has been
//! offline longer than the idle grace period.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::auth::AccountStore;
use crate::config::ServerConfig;
use crate::game::registry::SessionRegistry;
use crate::network::handler;

/// How often the idle sweeper wakes up.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// The listening server: one registry, one account store, one accept loop.
pub struct SessionServer {
    listener: TcpListener,
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
    store: Arc<dyn AccountStore>,
}

impl SessionServer {
    /// Bind the configured address. Port zero picks a free port; use
    /// [`local_addr`](Self::local_addr) to discover it.
    pub async fn bind(config: ServerConfig, store: Arc<dyn AccountStore>) -> io::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "listening");
        Ok(Self {
            listener,
            config,
            registry: Arc::new(SessionRegistry::new()),
            store,
        })
    }

    /// The bound address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the session registry.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections until the listener fails. Each connection runs as
    /// its own task holding one permit; once all permits are out, further
    /// accepts wait for a connection to finish.
    pub async fn run(self) -> io::Result<()> {
        let sweeper_registry = Arc::clone(&self.registry);
        let grace = self.config.idle_grace;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                let swept = sweeper_registry.sweep_idle(grace);
                if swept > 0 {
                    debug!(swept, "idle sessions removed");
                }
            }
        });

        let permits = Arc::new(Semaphore::new(self.config.max_connections));
        loop {
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .expect("connection semaphore closed");

            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(error) => {
                    warn!(%error, "accept failed");
                    continue;
                }
            };
            if let Err(error) = stream.set_nodelay(true) {
                debug!(%addr, %error, "could not disable nagle");
            }
            info!(%addr, "connection accepted");

            let registry = Arc::clone(&self.registry);
            let store = Arc::clone(&self.store);
            tokio::spawn(async move {
                handler::run_connection(stream, addr, registry, store).await;
                drop(permit);
            });
        }
    }
}
