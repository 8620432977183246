//! Relay Pair
//!
//! Two pumps per session, one per direction, each a sequential
//! read-then-write loop so ordering within a direction is preserved.
//!
//! The first pump to stop moves the session to `Closing` and cancels the
//! session token, which wakes the other pump even when it is parked in a read.
//! The task that called [`RelayPair::run`] joins both pumps and is the only
//! place teardown happens.

use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, trace};

use super::listener::ProxyStats;
use super::registry::SessionRegistry;
use super::session::{Direction, Session};
use crate::error::RelayError;
use crate::protocol::is_high_frequency;

/// Longest message prefix written to the debug log
const LOG_PREVIEW_CHARS: usize = 100;

/// A message-oriented, full-duplex transport one side of a session runs over
pub trait MessageTransport:
    Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin + Send + 'static
{
}

impl<T> MessageTransport for T where
    T: Stream<Item = Result<Message, WsError>>
        + Sink<Message, Error = WsError>
        + Unpin
        + Send
        + 'static
{
}

/// Why a pump stopped
#[derive(Debug)]
pub enum PumpExit {
    /// The source sent a close frame or ended
    SourceClosed,
    /// The sibling pump or a shutdown cancelled the session
    Cancelled,
    /// Reading the source or writing the destination failed
    Failed(RelayError),
    /// The pump task itself died
    Aborted(String),
}

/// How both directions of a session ended
#[derive(Debug)]
pub struct RelayOutcome {
    pub upstream: PumpExit,
    pub downstream: PumpExit,
}

/// The pump pair for one session
pub struct RelayPair<C, B> {
    session: Arc<Session>,
    client: C,
    backend: B,
    registry: SessionRegistry,
    stats: Arc<ProxyStats>,
    close_timeout: Duration,
}

impl<C, B> RelayPair<C, B>
where
    C: MessageTransport,
    B: MessageTransport,
{
    pub fn new(
        session: Arc<Session>,
        client: C,
        backend: B,
        registry: SessionRegistry,
        stats: Arc<ProxyStats>,
        close_timeout: Duration,
    ) -> Self {
        Self {
            session,
            client,
            backend,
            registry,
            stats,
            close_timeout,
        }
    }

    /// Relay until either side stops, then tear the session down.
    pub async fn run(self) -> RelayOutcome {
        let RelayPair {
            session,
            client,
            backend,
            registry,
            stats,
            close_timeout,
        } = self;

        let (client_sink, client_source) = client.split();
        let (backend_sink, backend_source) = backend.split();

        let upstream = tokio::spawn(pump(
            Direction::ClientToBackend,
            client_source,
            backend_sink,
            Arc::clone(&session),
            Arc::clone(&stats),
        ));
        let downstream = tokio::spawn(pump(
            Direction::BackendToClient,
            backend_source,
            client_sink,
            Arc::clone(&session),
            Arc::clone(&stats),
        ));

        let (upstream, downstream) = tokio::join!(upstream, downstream);
        let (backend_sink, upstream) = joined(&session, Direction::ClientToBackend, upstream);
        let (client_sink, downstream) = joined(&session, Direction::BackendToClient, downstream);

        teardown(
            &session,
            &registry,
            &stats,
            client_sink,
            backend_sink,
            close_timeout,
        )
        .await;

        RelayOutcome {
            upstream,
            downstream,
        }
    }
}

/// Close both legs, drop the session from the registry and count it.
///
/// Only reached once per session, after both pumps have stopped.
async fn teardown<C, B>(
    session: &Session,
    registry: &SessionRegistry,
    stats: &ProxyStats,
    client_sink: Option<C>,
    backend_sink: Option<B>,
    close_timeout: Duration,
) where
    C: Sink<Message, Error = WsError> + Unpin,
    B: Sink<Message, Error = WsError> + Unpin,
{
    session.begin_closing();
    session.cancel();

    tokio::join!(
        close_quietly(session, "client", client_sink, close_timeout),
        close_quietly(session, "backend", backend_sink, close_timeout),
    );

    registry.remove(&session.id()).await;

    if session.mark_closed() {
        stats.session_closed();
        info!(
            "Session {} closed after {:.1?} ({} up, {} down)",
            session.id(),
            session.age(),
            session.messages(Direction::ClientToBackend),
            session.messages(Direction::BackendToClient),
        );
    }
}

fn joined<K>(
    session: &Session,
    direction: Direction,
    result: Result<(K, PumpExit), tokio::task::JoinError>,
) -> (Option<K>, PumpExit) {
    match result {
        Ok((sink, exit)) => (Some(sink), exit),
        Err(e) => {
            error!("Session {} {} pump died: {}", session.id(), direction, e);
            (None, PumpExit::Aborted(e.to_string()))
        }
    }
}

/// Forward messages from `source` to `sink` until one of them fails or the
/// session is cancelled. Hands the sink back so the owner can close it.
async fn pump<S, K>(
    direction: Direction,
    mut source: S,
    mut sink: K,
    session: Arc<Session>,
    stats: Arc<ProxyStats>,
) -> (K, PumpExit)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
    K: Sink<Message, Error = WsError> + Unpin,
{
    let cancel = session.cancel_token();

    let exit = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break PumpExit::Cancelled,
            next = source.next() => next,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => break PumpExit::Failed(RelayError::RelayRead(e.to_string())),
            None => break PumpExit::SourceClosed,
        };

        match &message {
            Message::Text(_) | Message::Binary(_) => {}
            Message::Close(frame) => {
                debug!("Session {} {}: close frame {:?}", session.id(), direction, frame);
                break PumpExit::SourceClosed;
            }
            // Control frames are answered by each leg's own transport.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        }

        let len = message.len() as u64;
        sample(&session, direction, &message);

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => break PumpExit::Cancelled,
            sent = sink.send(message) => sent,
        };
        if let Err(e) = sent {
            break PumpExit::Failed(RelayError::RelayWrite(e.to_string()));
        }

        session.record_message(direction);
        stats.record_relayed(direction, len);
    };

    if session.begin_closing() {
        debug!("Session {} closing: {} stopped first ({:?})", session.id(), direction, exit);
    }
    session.cancel();

    (sink, exit)
}

/// Read-only log sampling; skips the analog stream unless tracing is on
fn sample(session: &Session, direction: Direction, message: &Message) {
    match message {
        Message::Text(text) if !is_high_frequency(text) => {
            let preview: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
            debug!("Session {} {}: {}", session.id(), direction, preview);
        }
        _ => trace!("Session {} {}: {} bytes", session.id(), direction, message.len()),
    }
}

/// Close one leg, treating an already-closed transport as success
async fn close_quietly<K>(session: &Session, leg: &str, sink: Option<K>, limit: Duration)
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    let Some(mut sink) = sink else {
        return;
    };

    match tokio::time::timeout(limit, sink.close()).await {
        Ok(Ok(())) => trace!("Session {} {} leg closed", session.id(), leg),
        Ok(Err(e)) => debug!("Session {} {} leg already closed: {}", session.id(), leg, e),
        Err(_) => debug!("Session {} {} leg close timed out", session.id(), leg),
    }
}
