//! Real-time Position Presence Relay Library
//!
//! A WebSocket relay built with tokio-tungstenite. Clients announce a 3D
//! position under an identifier and get a live view of everyone else.
//!
//! # Protocol
//! - The first client frame is a join: `{"id": .., "x": .., "y": .., "z": ..}`
//! - The joiner receives `init` with every other client's position
//! - Peers receive `add` on join, `update` on moves, `remove` on disconnect
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `PresenceServer` is the central actor owning the registry and the live
//!   connection set
//! - Each connection has a `handler` task communicating with the server
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use presence_relay::{serve, Config};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let listener = TcpListener::bind(&config.bind).await.unwrap();
//!     serve(listener, config).await;
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod peer;
pub mod registry;
pub mod server;
pub mod types;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};

// Re-export main types for convenience
pub use config::{Config, ConnectionConfig};
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use message::{ClientMessage, JoinMessage, ServerMessage, Target};
pub use peer::Peer;
pub use registry::Registry;
pub use server::{PresenceServer, ServerCommand};
pub use types::{ClientId, ConnectionId, Position};

/// Start the PresenceServer actor and accept connections forever
///
/// Returns a sender for the actor so callers can query it alongside the
/// running relay.
pub fn spawn_server(config: &Config) -> mpsc::Sender<ServerCommand> {
    let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity);
    tokio::spawn(PresenceServer::new(cmd_rx).run());
    info!("PresenceServer actor started");
    cmd_tx
}

/// Accept loop: one handler task per incoming connection
pub async fn serve(listener: TcpListener, config: Config) {
    let cmd_tx = spawn_server(&config);
    accept_loop(listener, cmd_tx, config.connection()).await;
}

/// Accept connections and hand them to `handle_connection`
pub async fn accept_loop(
    listener: TcpListener,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: ConnectionConfig,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, cmd_tx, config).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
