//! Presence Relay - Entry Point
//!
//! Parses configuration, starts the TCP listener and the PresenceServer
//! actor, and accepts connections.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use presence_relay::{serve, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    // Use RUST_LOG env var to override the configured filter
    // e.g., RUST_LOG=debug or RUST_LOG=presence_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let listener = TcpListener::bind(&config.bind).await?;
    info!("Presence relay listening on {}", config.bind);
    if let Some(limit) = config.join_timeout() {
        info!("Join timeout: {:?}", limit);
    }

    serve(listener, config).await;

    Ok(())
}
