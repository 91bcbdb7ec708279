//! # termbridge-core
//!
//! Core types for the termbridge Telnet relay.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other termbridge crates. It provides:
//!
//! - Session types (SessionId, RelayState, SessionInfo, Credentials)
//! - Wire messages exchanged with the browser client
//! - Address validation for remote targets
//! - Configuration loading
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other termbridge crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod config;
pub mod error;
pub mod message;
pub mod session;

// Re-export commonly used types
pub use address::{validate_ipv4, validate_port};
pub use config::{
    ProbeSettings, PromptSettings, RemoteSettings, ServerConfig, ServerSettings,
};
pub use error::{Error, Result};
pub use message::{ClientMessage, ProbeRequest, ProbeResponse, ServerMessage};
pub use session::{Credentials, RelayState, SessionId, SessionInfo};
