//! # termbridge
//!
//! WebSocket relay for interactive Telnet sessions to network devices.
//!
//! ## Overview
//!
//! The server exposes:
//! - `/ws/shell`: one interactive Telnet session per WebSocket
//! - `/api/probe`: one-shot connect, login and command
//! - `/api/sessions`: live client connections
//! - `/health`: liveness check
//!
//! ## Architecture
//!
//! This is Layer 3 - the server binary that ties together:
//! - termbridge-core: Core types, messages and configuration
//! - termbridge-filter: Protocol filter
//! - termbridge-session: Relay and remote session lifecycle

use anyhow::Context;
use termbridge_core::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1));

    let mut config = match config_path {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        None => ServerConfig::default(),
    };
    config.apply_env_port(std::env::var("PORT").ok().as_deref())?;
    config.validate()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .init();

    tracing::info!(
        "termbridge v{} starting (remote port {}, max sessions {})",
        env!("CARGO_PKG_VERSION"),
        config.remote.default_port,
        config.server.max_sessions
    );

    termbridge::serve(config).await.map_err(|e| {
        tracing::error!("Error running server: {}", e);
        e
    })?;

    tracing::info!("termbridge shutting down");

    Ok(())
}
