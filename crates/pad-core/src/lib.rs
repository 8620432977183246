//! Padrelay Core Library
//!
//! This crate provides the relay proxy that sits between mobile-controller
//! clients and a game backend. It includes:
//! - A listener that accepts controller WebSocket connections
//! - One dedicated backend connection per client, relayed in both directions
//! - A session registry with exactly-once teardown
//! - Controller message shapes shared with the simulator

pub mod brand;
pub mod config;
pub mod error;
pub mod protocol;
pub mod proxy;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use protocol::{ButtonState, ControllerInput, PlayerRegistration};
pub use proxy::{
    Direction, ProxyStats, RelayHandle, RelayServer, SessionId, SessionInfo, SessionRegistry,
    SessionState,
};

// Re-export the transport types callers build clients and backends with
pub use tokio_tungstenite::tungstenite::Message;
