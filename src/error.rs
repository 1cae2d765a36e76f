//! Error types for the presence relay
//!
//! Defines connection-level errors and peer send errors.
//! Uses thiserror for ergonomic error definitions.

use std::time::Duration;

use thiserror::Error;

/// Connection-level errors
///
/// Every variant ends the connection: the handler tears the session down
/// and nothing is reported back to the client.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error (malformed join message)
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// No join message arrived in time
    #[error("No join message within {0:?}")]
    JoinTimeout(Duration),
}

/// Peer send errors
///
/// Occurs when a broadcast cannot be queued for one live connection.
/// Never aborts delivery to the other connections.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
