//! Error types for the termbridge relay.
//!
//! The `Display` text of each variant is what a browser client sees in an
//! `error` or `status` message, so keep it short and free of secrets.

use thiserror::Error;

use crate::SessionId;

/// Main error type for relay operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote address is not a dotted-quad IPv4 address
    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),

    /// Remote port outside 1..=65535
    #[error("Invalid port: {0}")]
    InvalidPort(i64),

    /// Client message could not be decoded
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Command or control received with no remote session
    #[error("No active session")]
    NoActiveSession,

    /// Command or control received before the remote handshake completed
    #[error("Session is not ready yet")]
    SessionNotReady,

    /// Session not found in the registry
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// Session limit reached
    #[error("Session limit reached (max: {0})")]
    SessionLimitReached(usize),

    /// Transport handshake did not complete in time
    #[error("Timed out connecting to {addr} after {timeout_ms}ms")]
    ConnectTimeout {
        /// Remote address
        addr: String,
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Transport-level failure (refused, reset, unreachable)
    #[error("Connection to {addr} failed: {reason}")]
    ConnectionFailed {
        /// Remote address
        addr: String,
        /// Underlying reason
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
