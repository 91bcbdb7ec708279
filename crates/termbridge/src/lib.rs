//! termbridge server library
//!
//! This library contains the HTTP and WebSocket layer of the relay.
//! The actual server binary is in main.rs.

pub mod server;

// Re-export commonly used types
pub use server::{create_router, serve, AppState};
