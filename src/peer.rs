//! Peer struct definition
//!
//! Represents one live connection as seen by the relay: its ids and the
//! channel feeding its WebSocket write task.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{ClientId, ConnectionId};

/// A joined, live connection
#[derive(Debug)]
pub struct Peer {
    /// Transport connection this peer lives on
    pub conn_id: ConnectionId,
    /// Identifier announced in the join message
    pub client_id: ClientId,
    /// Server → Client message channel
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Peer {
    /// Create a new peer with the given ids and sender channel
    pub fn new(
        conn_id: ConnectionId,
        client_id: ClientId,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        Self {
            conn_id,
            client_id,
            sender,
        }
    }

    /// Queue a message for this peer without waiting
    ///
    /// The queue is unbounded, so a slow peer never loses a message. Fails
    /// only once the peer has disconnected.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender
            .send(msg)
            .map_err(|_| SendError::ChannelClosed)
    }
}
