//! # termbridge-session
//!
//! Session lifecycle management for the termbridge relay.
//!
//! This crate provides:
//! - Remote sessions: one outbound Telnet socket per connection attempt
//! - Relay sessions: the per-client state machine bridging a message
//!   channel to a remote session
//! - The session registry tracking live client connections
//! - One-shot probes of a Telnet host
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on termbridge-core
//! and termbridge-filter, and owns every socket opened towards a remote host.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod probe;
pub mod registry;
pub mod relay;
pub mod remote;

// Re-export commonly used types
pub use probe::probe;
pub use registry::SessionRegistry;
pub use relay::{RelaySession, STATUS_DISCONNECTED, STATUS_REMOTE_CLOSED};
pub use remote::{RemoteEvent, RemoteEventKind, RemoteSession};
