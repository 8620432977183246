//! Shared fixtures for relay integration tests
//!
//! A scriptable WebSocket backend, an echo backend, and helpers that wait for
//! messages or closes with a bounded timeout.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use pad_core::{Message, RelayConfig, RelayHandle, RelayServer};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

pub const WAIT: Duration = Duration::from_secs(3);

pub type BackendConn = WebSocketStream<TcpStream>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,pad_core=debug")
        .with_test_writer()
        .try_init();
}

/// Backend that hands every accepted WebSocket to the test
pub struct ScriptedBackend {
    addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<BackendConn>,
    task: tokio::task::JoinHandle<()>,
}

impl ScriptedBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind backend");
        let addr = listener.local_addr().unwrap();
        let (tx, connections) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                        let _ = tx.send(ws);
                    }
                });
            }
        });

        Self {
            addr,
            connections,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Next connection the proxy opened towards this backend
    pub async fn next_connection(&mut self) -> BackendConn {
        tokio::time::timeout(WAIT, self.connections.recv())
            .await
            .expect("Proxy never dialled the backend")
            .expect("Backend stopped")
    }
}

impl Drop for ScriptedBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Backend that sends every text or binary message straight back
pub async fn start_echo_backend() -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind echo backend");
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let task = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if (message.is_text() || message.is_binary()) && ws.send(message).await.is_err()
                    {
                        break;
                    }
                }
            });
        }
    });

    (url, task)
}

/// An address nothing is listening on
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn proxy_config(backend_url: &str) -> RelayConfig {
    RelayConfig::new()
        .with_bind_port(0)
        .with_backend_url(backend_url)
        .with_connect_timeout(Duration::from_secs(1))
        .with_shutdown_timeout(Duration::from_secs(2))
}

pub async fn start_proxy(backend_url: &str) -> RelayHandle {
    RelayServer::bind(proxy_config(backend_url))
        .await
        .expect("Failed to bind proxy")
        .spawn()
}

/// Next text message, skipping control frames
pub async fn recv_text<S>(ws: &mut S) -> String
where
    S: futures::Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        let next = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("Timed out waiting for a message");
        match next {
            Some(Ok(Message::Text(text))) => return text,
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            other => panic!("Expected a text message, got {:?}", other),
        }
    }
}

/// Wait until the peer closes; returns the close frame if one was sent
pub async fn expect_closed<S>(ws: &mut S) -> Option<CloseFrame<'static>>
where
    S: futures::Stream<Item = Result<Message, WsError>> + Unpin,
{
    let deadline = Instant::now() + WAIT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let next = tokio::time::timeout(remaining, ws.next())
            .await
            .expect("Connection was not closed in time");
        match next {
            Some(Ok(Message::Close(frame))) => return frame,
            None | Some(Err(_)) => return None,
            Some(Ok(_)) => continue,
        }
    }
}

/// Poll `check` until it holds or the wait budget runs out
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + WAIT;
    while !check().await {
        assert!(Instant::now() < deadline, "Timed out waiting for: {}", what);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
