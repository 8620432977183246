//! Relay Server
//!
//! Owns the listener, the registry and every task the proxy spawns, and
//! defines how the whole thing starts and stops.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use super::listener::{ProxyListener, ProxyStats};
use super::pairer::ConnectionPairer;
use super::registry::SessionRegistry;
use crate::config::RelayConfig;
use crate::error::Result;

/// A bound, not yet running, relay proxy
#[derive(Debug)]
pub struct RelayServer {
    listener: ProxyListener,
    pairer: ConnectionPairer,
    registry: SessionRegistry,
    stats: Arc<ProxyStats>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    shutdown_timeout: Duration,
}

impl RelayServer {
    /// Validate the configuration and bind the listening socket
    pub async fn bind(config: RelayConfig) -> Result<Self> {
        config.validate()?;

        let stats = ProxyStats::new();
        let registry = SessionRegistry::new();
        let shutdown = CancellationToken::new();
        let listener = ProxyListener::bind(&config.bind_addr(), Arc::clone(&stats)).await?;
        let pairer = ConnectionPairer::new(
            &config,
            registry.clone(),
            Arc::clone(&stats),
            shutdown.clone(),
        );

        info!("Proxying to backend {}", config.backend_url);

        Ok(Self {
            listener,
            pairer,
            registry,
            stats,
            shutdown,
            tracker: TaskTracker::new(),
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Address the proxy accepts connections on
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Live sessions, shared with the running server
    pub fn registry(&self) -> SessionRegistry {
        self.registry.clone()
    }

    /// Get statistics
    pub fn stats(&self) -> Arc<ProxyStats> {
        Arc::clone(&self.stats)
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept until shut down, then drain every session.
    pub async fn run(self) -> Result<()> {
        let RelayServer {
            listener,
            pairer,
            registry,
            stats,
            shutdown,
            tracker,
            shutdown_timeout,
        } = self;

        listener.run(pairer, tracker.clone(), shutdown.clone()).await;

        tracker.close();
        let live = registry.close_all().await;
        if live > 0 {
            info!("Closing {} live session(s)", live);
        }

        if tokio::time::timeout(shutdown_timeout, tracker.wait()).await.is_err() {
            warn!(
                "{} task(s) still running after {:?}; {} session(s) left in registry",
                tracker.len(),
                shutdown_timeout,
                registry.len().await
            );
        }

        info!(
            "Proxy stopped: {} session(s) served, {} backend failure(s)",
            stats.get_sessions_total(),
            stats.get_backend_failures()
        );
        Ok(())
    }

    /// Run on a background task, returning a handle to observe and stop it
    pub fn spawn(self) -> RelayHandle {
        let local_addr = self.local_addr();
        let registry = self.registry();
        let stats = self.stats();
        let shutdown = self.shutdown_token();
        let task = tokio::spawn(self.run());

        RelayHandle {
            local_addr,
            registry,
            stats,
            shutdown,
            task,
        }
    }
}

/// Handle to a server started with [`RelayServer::spawn`]
#[derive(Debug)]
pub struct RelayHandle {
    local_addr: SocketAddr,
    registry: SessionRegistry,
    stats: Arc<ProxyStats>,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<Result<()>>,
}

impl RelayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `ws://` URL clients should dial
    pub fn url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    pub fn registry(&self) -> SessionRegistry {
        self.registry.clone()
    }

    pub fn stats(&self) -> Arc<ProxyStats> {
        Arc::clone(&self.stats)
    }

    /// Stop accepting, close every session and wait for the server to exit
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(std::io::Error::other(e).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{Session, SessionId};

    fn config() -> RelayConfig {
        RelayConfig::new()
            .with_bind_port(0)
            .with_shutdown_timeout(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let result = RelayServer::bind(config().with_backend_url("http://nope")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_every_registered_session() {
        let server = RelayServer::bind(config()).await.unwrap();
        let registry = server.registry();

        // Token unrelated to the server's shutdown token.
        let session = Arc::new(Session::new(
            SessionId::generate(),
            "127.0.0.1:40100".parse().unwrap(),
            CancellationToken::new(),
        ));
        session.activate();
        registry.insert(Arc::clone(&session)).await.unwrap();

        let handle = server.spawn();
        assert!(!session.is_cancelled());

        tokio::time::timeout(Duration::from_secs(3), handle.shutdown())
            .await
            .expect("Shutdown did not finish in time")
            .unwrap();
        assert!(session.is_cancelled());
    }
}
