//! Connection Pairer
//!
//! Turns one accepted TCP connection into a session: finish the client's
//! WebSocket handshake, dial the backend, register the pair and relay.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::listener::ProxyStats;
use super::registry::SessionRegistry;
use super::relay::{RelayOutcome, RelayPair};
use super::session::{Session, SessionId};
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

/// Inbound leg, as accepted from a controller
pub type ClientSocket = WebSocketStream<TcpStream>;

/// Outbound leg, as dialled to the backend
pub type BackendSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Pairs every inbound connection with a dedicated backend connection
#[derive(Debug, Clone)]
pub struct ConnectionPairer {
    backend_url: Arc<str>,
    connect_timeout: Duration,
    handshake_timeout: Duration,
    close_timeout: Duration,
    registry: SessionRegistry,
    stats: Arc<ProxyStats>,
    shutdown: CancellationToken,
}

impl ConnectionPairer {
    pub fn new(
        config: &RelayConfig,
        registry: SessionRegistry,
        stats: Arc<ProxyStats>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            backend_url: Arc::from(config.backend_url.as_str()),
            connect_timeout: config.connect_timeout(),
            handshake_timeout: config.handshake_timeout(),
            close_timeout: config.close_timeout(),
            registry,
            stats,
            shutdown,
        }
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Establish and run one session for an accepted connection.
    ///
    /// Returns once the session is fully torn down, or immediately if the
    /// session could not be established. Failures are logged, never raised.
    pub async fn establish(&self, stream: TcpStream, addr: SocketAddr) -> Option<RelayOutcome> {
        let client = match self.accept_client(stream).await {
            Ok(client) => client,
            Err(e) => {
                self.stats.handshake_failed();
                warn!("Handshake with {} failed: {}", addr, e);
                return None;
            }
        };

        let backend = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                debug!("Shutdown while dialling backend for {}", addr);
                self.reject(client, CloseCode::Away, "proxy shutting down").await;
                return None;
            }
            backend = self.connect_backend() => backend,
        };

        let mut backend = match backend {
            Ok(backend) => backend,
            Err(e) => {
                self.stats.backend_failed();
                warn!("Backend unavailable for {}: {}", addr, e);
                self.reject(client, CloseCode::Error, "backend unavailable").await;
                return None;
            }
        };

        let session = Arc::new(Session::new(
            SessionId::generate(),
            addr,
            self.shutdown.child_token(),
        ));
        session.activate();

        if let Err(e) = self.registry.insert(Arc::clone(&session)).await {
            error!("Could not register session for {}: {}", addr, e);
            let _ = tokio::time::timeout(self.close_timeout, backend.close(None)).await;
            self.reject(client, CloseCode::Error, "session conflict").await;
            return None;
        }

        self.stats.session_opened();
        info!(
            "Session {} paired {} with {}",
            session.id(),
            addr,
            self.backend_url
        );

        let relay = RelayPair::new(
            session,
            client,
            backend,
            self.registry.clone(),
            Arc::clone(&self.stats),
            self.close_timeout,
        );
        Some(relay.run().await)
    }

    /// Complete the server side of the client's WebSocket handshake
    async fn accept_client(&self, stream: TcpStream) -> Result<ClientSocket> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                Err(RelayError::Handshake("proxy shutting down".to_string()))
            }
            accepted = tokio::time::timeout(
                self.handshake_timeout,
                tokio_tungstenite::accept_async(stream),
            ) => match accepted {
                Ok(Ok(client)) => Ok(client),
                Ok(Err(e)) => Err(RelayError::Handshake(e.to_string())),
                Err(_) => Err(RelayError::Handshake(format!(
                    "timed out after {:?}",
                    self.handshake_timeout
                ))),
            },
        }
    }

    /// Dial the backend once; a timeout counts as a failed attempt
    async fn connect_backend(&self) -> Result<BackendSocket> {
        let url: &str = &self.backend_url;
        match tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(url)).await
        {
            Ok(Ok((backend, _response))) => Ok(backend),
            Ok(Err(e)) => Err(RelayError::BackendConnect {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(RelayError::BackendTimeout {
                url: url.to_string(),
                timeout: self.connect_timeout,
            }),
        }
    }

    /// Close an inbound leg that never became a session
    async fn reject(&self, mut client: ClientSocket, code: CloseCode, reason: &'static str) {
        let frame = CloseFrame {
            code,
            reason: Cow::Borrowed(reason),
        };
        match tokio::time::timeout(self.close_timeout, client.close(Some(frame))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Client already gone while rejecting: {}", e),
            Err(_) => debug!("Timed out rejecting client"),
        }
    }
}
