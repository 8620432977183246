//! TCP Listener for the Proxy
//!
//! Accepts incoming connections and hands each one to the pairer as its own
//! tracked task, so a slow establishment never holds up the next accept.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::pairer::ConnectionPairer;
use super::session::Direction;
use crate::error::{RelayError, Result};

/// Statistics for the proxy
#[derive(Debug, Default)]
pub struct ProxyStats {
    pub connections_accepted: AtomicU64,
    pub accept_errors: AtomicU64,
    pub handshake_failures: AtomicU64,
    pub backend_failures: AtomicU64,
    pub sessions_total: AtomicU64,
    pub sessions_active: AtomicU64,
    pub sessions_closed: AtomicU64,
    pub messages_upstream: AtomicU64,
    pub messages_downstream: AtomicU64,
    pub bytes_upstream: AtomicU64,
    pub bytes_downstream: AtomicU64,
}

impl ProxyStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accept_failed(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_failed(&self) {
        self.handshake_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backend_failed(&self) {
        self.backend_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_opened(&self) {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relayed(&self, direction: Direction, bytes: u64) {
        let (messages, total) = match direction {
            Direction::ClientToBackend => (&self.messages_upstream, &self.bytes_upstream),
            Direction::BackendToClient => (&self.messages_downstream, &self.bytes_downstream),
        };
        messages.fetch_add(1, Ordering::Relaxed);
        total.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn get_sessions_total(&self) -> u64 {
        self.sessions_total.load(Ordering::Relaxed)
    }

    pub fn get_sessions_active(&self) -> u64 {
        self.sessions_active.load(Ordering::Relaxed)
    }

    pub fn get_sessions_closed(&self) -> u64 {
        self.sessions_closed.load(Ordering::Relaxed)
    }

    pub fn get_backend_failures(&self) -> u64 {
        self.backend_failures.load(Ordering::Relaxed)
    }

    pub fn get_messages(&self, direction: Direction) -> u64 {
        match direction {
            Direction::ClientToBackend => self.messages_upstream.load(Ordering::Relaxed),
            Direction::BackendToClient => self.messages_downstream.load(Ordering::Relaxed),
        }
    }
}

/// Listens for incoming connections to pair with the backend
#[derive(Debug)]
pub struct ProxyListener {
    /// The bound TCP listener
    listener: TcpListener,

    /// Address actually bound (resolves port 0)
    local_addr: SocketAddr,

    /// Statistics
    stats: Arc<ProxyStats>,
}

impl ProxyListener {
    /// Bind the listening socket. Failure here is fatal for the proxy.
    pub async fn bind(addr: &str, stats: Arc<ProxyStats>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| RelayError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        let local_addr = listener.local_addr()?;
        info!("Proxy listening on {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            stats,
        })
    }

    /// Get the bound address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get statistics
    pub fn stats(&self) -> Arc<ProxyStats> {
        Arc::clone(&self.stats)
    }

    /// Run the accept loop until `shutdown` is cancelled.
    ///
    /// Each connection is established on `tracker` so the caller can wait for
    /// every session to drain after the loop returns.
    pub async fn run(
        self,
        pairer: ConnectionPairer,
        tracker: TaskTracker,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Proxy on {} stopped accepting", self.local_addr);
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            self.stats.connection_accepted();
                            debug!("Accepted connection from {}", addr);

                            let pairer = pairer.clone();
                            tracker.spawn(async move {
                                pairer.establish(stream, addr).await;
                            });
                        }
                        Err(e) => {
                            self.stats.accept_failed();
                            warn!("Accept error: {}", e);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_resolves_random_port() {
        let listener = ProxyListener::bind("127.0.0.1:0", ProxyStats::new())
            .await
            .unwrap();
        assert_ne!(listener.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_fatal() {
        let first = ProxyListener::bind("127.0.0.1:0", ProxyStats::new())
            .await
            .unwrap();
        let taken = first.local_addr().to_string();

        let err = ProxyListener::bind(&taken, ProxyStats::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Bind { addr, .. } if addr == taken));
    }

    #[test]
    fn test_stats_accounting() {
        let stats = ProxyStats::new();
        stats.session_opened();
        stats.session_opened();
        stats.session_closed();
        stats.record_relayed(Direction::ClientToBackend, 10);
        stats.record_relayed(Direction::ClientToBackend, 5);

        assert_eq!(stats.get_sessions_total(), 2);
        assert_eq!(stats.get_sessions_active(), 1);
        assert_eq!(stats.get_sessions_closed(), 1);
        assert_eq!(stats.get_messages(Direction::ClientToBackend), 2);
        assert_eq!(stats.bytes_upstream.load(Ordering::Relaxed), 15);
        assert_eq!(stats.get_messages(Direction::BackendToClient), 0);
    }
}
