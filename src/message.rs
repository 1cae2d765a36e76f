//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol. The first client frame is an
//! untagged join announcement; later client frames and all server frames use
//! Serde's tagged enum with a `type` field.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::types::{ClientId, Position};

/// Join announcement, the first frame a client sends
///
/// All four fields are required. Anything else in the object (the reference
/// client sends `"type": "init"`) is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinMessage {
    pub id: ClientId,
    pub x: Number,
    pub y: Number,
    pub z: Number,
}

impl JoinMessage {
    /// Decode a join announcement from raw frame bytes
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn position(&self) -> Position {
        Position::new(self.x.clone(), self.y.clone(), self.z.clone())
    }
}

/// Client → Server message after the join
///
/// Frames that do not decode as one of these are only logged.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Move to a new position
    Update { target: Target },
}

/// Named coordinates carried by `update` messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub x: Number,
    pub y: Number,
    pub z: Number,
}

impl From<Target> for Position {
    fn from(t: Target) -> Self {
        Position::new(t.x, t.y, t.z)
    }
}

impl From<Position> for Target {
    fn from(p: Position) -> Self {
        let Position(x, y, z) = p;
        Target { x, y, z }
    }
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Snapshot of every other joined client, sent once after the join
    Init { players: HashMap<ClientId, Position> },
    /// A client joined
    Add {
        id: ClientId,
        x: Number,
        y: Number,
        z: Number,
    },
    /// A client disconnected
    Remove { id: ClientId },
    /// A client moved
    Update { id: ClientId, target: Target },
}

impl ServerMessage {
    pub fn add(id: ClientId, position: Position) -> Self {
        let Position(x, y, z) = position;
        ServerMessage::Add { id, x, y, z }
    }

    /// Message type tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Init { .. } => "init",
            ServerMessage::Add { .. } => "add",
            ServerMessage::Remove { .. } => "remove",
            ServerMessage::Update { .. } => "update",
        }
    }
}
