//! Basic type definitions for the presence relay
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: opaque identifier announced by the client
//! - `ConnectionId`: UUID-based identifier for one transport connection
//! - `Position`: last-known (x, y, z) coordinates

use serde::{Deserialize, Serialize};
use serde_json::Number;
use uuid::Uuid;

/// Client identifier as announced in the join message
///
/// Opaque to the server. Uniqueness is not enforced: a second client
/// announcing the same id overwrites the first one's registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4. Keys the live connection set, since two
/// connections may announce the same `ClientId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Last-known position of a client
///
/// Coordinates are kept as the JSON numbers the client sent, so an integer
/// position is echoed back as integers. Serializes as `[x, y, z]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position(pub Number, pub Number, pub Number);

impl Position {
    pub fn new(x: Number, y: Number, z: Number) -> Self {
        Self(x, y, z)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.0, self.1, self.2)
    }
}
