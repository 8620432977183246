//! Relay Sessions
//!
//! A session is one inbound client paired with its own backend connection.
//! The transports themselves live inside the relay pair; this type carries
//! identity, lifecycle state and counters that the registry can share.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Process-unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client_{}", self.0.simple())
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Active = 1,
    Closing = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Connecting,
            1 => SessionState::Active,
            2 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Relay direction within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToBackend,
    BackendToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToBackend => f.write_str("client -> backend"),
            Direction::BackendToClient => f.write_str("backend -> client"),
        }
    }
}

/// Shared state of one paired client/backend connection
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    client_addr: SocketAddr,
    state: AtomicU8,
    created_at: SystemTime,
    started: Instant,
    cancel: CancellationToken,
    upstream_messages: AtomicU64,
    downstream_messages: AtomicU64,
}

impl Session {
    /// Create a session in the `Connecting` state.
    ///
    /// `cancel` should be a child of the server shutdown token so that
    /// shutting the server down reaches every session.
    pub fn new(id: SessionId, client_addr: SocketAddr, cancel: CancellationToken) -> Self {
        Self {
            id,
            client_addr,
            state: AtomicU8::new(SessionState::Connecting as u8),
            created_at: SystemTime::now(),
            started: Instant::now(),
            cancel,
            upstream_messages: AtomicU64::new(0),
            downstream_messages: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }

    /// Connecting -> Active. Returns false if the session already moved on.
    pub fn activate(&self) -> bool {
        self.transition(SessionState::Connecting, SessionState::Active)
    }

    /// Enter `Closing`. Exactly one caller wins, no matter how many pumps
    /// finish at the same time.
    pub fn begin_closing(&self) -> bool {
        self.transition(SessionState::Active, SessionState::Closing)
            || self.transition(SessionState::Connecting, SessionState::Closing)
    }

    /// Closing -> Closed. Exactly one caller wins.
    pub fn mark_closed(&self) -> bool {
        self.transition(SessionState::Closing, SessionState::Closed)
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Ask both pumps to stop. Safe to call any number of times.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn record_message(&self, direction: Direction) {
        let counter = match direction {
            Direction::ClientToBackend => &self.upstream_messages,
            Direction::BackendToClient => &self.downstream_messages,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages(&self, direction: Direction) -> u64 {
        match direction {
            Direction::ClientToBackend => self.upstream_messages.load(Ordering::Relaxed),
            Direction::BackendToClient => self.downstream_messages.load(Ordering::Relaxed),
        }
    }

    /// Point-in-time view for diagnostics
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            client_addr: self.client_addr,
            state: self.state(),
            created_at: self.created_at,
            age: self.age(),
            upstream_messages: self.messages(Direction::ClientToBackend),
            downstream_messages: self.messages(Direction::BackendToClient),
        }
    }
}

/// Snapshot of a session returned by registry enumeration
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: SessionId,
    pub client_addr: SocketAddr,
    pub state: SessionState,
    pub created_at: SystemTime,
    pub age: Duration,
    pub upstream_messages: u64,
    pub downstream_messages: u64,
}
