//! Error types for Padrelay
//!
//! Provides a unified error handling strategy using thiserror.
//!
//! Only [`RelayError::Bind`] is fatal to the proxy. Every other variant is
//! scoped to a single establishment attempt or a single session. Errors raised
//! while closing an already-closed transport are never turned into a
//! `RelayError`; they are logged and dropped.

use std::time::Duration;

use thiserror::Error;

use crate::proxy::SessionId;

/// Result type alias for Padrelay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Unified error type for all Padrelay operations
#[derive(Error, Debug)]
pub enum RelayError {
    // ─────────────────────────────────────────────────────────────
    // Listener Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to bind to {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    // ─────────────────────────────────────────────────────────────
    // Backend Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to connect to backend {url}: {reason}")]
    BackendConnect { url: String, reason: String },

    #[error("Backend {url} did not answer within {timeout:?}")]
    BackendTimeout { url: String, timeout: Duration },

    // ─────────────────────────────────────────────────────────────
    // Relay Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Relay read failed: {0}")]
    RelayRead(String),

    #[error("Relay write failed: {0}")]
    RelayWrite(String),

    #[error("Session {0} is already registered")]
    DuplicateSession(SessionId),

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for RelayError {
    fn from(err: toml::de::Error) -> Self {
        RelayError::Config(err.to_string())
    }
}
