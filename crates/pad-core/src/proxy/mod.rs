//! WebSocket Relay Proxy
//!
//! Pairs every inbound controller connection with its own backend
//! connection and relays messages both ways until either side goes away.

pub mod listener;
pub mod pairer;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;

pub use listener::{ProxyListener, ProxyStats};
pub use pairer::ConnectionPairer;
pub use registry::SessionRegistry;
pub use relay::{MessageTransport, PumpExit, RelayOutcome, RelayPair};
pub use server::{RelayHandle, RelayServer};
pub use session::{Direction, Session, SessionId, SessionInfo, SessionState};
