//! Error types for the controller simulator

use thiserror::Error;

/// Result type alias for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Client {0} is not connected")]
    NotConnected(usize),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Invalid setup file: {0}")]
    Setup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
