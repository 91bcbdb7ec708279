//! # termbridge-filter
//!
//! Protocol filter for raw Telnet shell output.
//!
//! This crate provides:
//! - TELNET option-negotiation stripping with carry-over between reads
//! - UTF-8 decoding with a Latin-1 fallback for stray bytes
//! - ANSI/VT sanitizing (escape removal, newline normalization, destructive backspace)
//! - Pager prompt detection
//! - Credential prompt watching for login auto-submission
//!
//! Everything here is pure: no sockets, no tasks, no clocks.
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on termbridge-core
//! and is used by termbridge-session for every byte read from a remote host.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod filter;
pub mod pager;
pub mod parser;
pub mod prompt;
pub mod telnet;
pub mod text;

// Re-export commonly used types
pub use filter::{filter, FilterOutput, ProtocolFilter, DEFAULT_PAGER_MARKER};
pub use pager::PagerDetector;
pub use parser::{Sanitizer, MAX_CONTROL_STRING};
pub use prompt::{PromptAction, PromptMatcher, PromptWatcher};
pub use telnet::{Negotiation, TelnetDecoder, Verb};
pub use text::TextDecoder;
