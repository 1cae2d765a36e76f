//! Position registry
//!
//! Maps each joined client's identifier to its last-known position.
//! Owned by the `PresenceServer` actor, so no locking is needed.

use std::collections::HashMap;

use crate::types::{ClientId, Position};

/// Client identifier → last-known position
#[derive(Debug, Default)]
pub struct Registry {
    players: HashMap<ClientId, Position>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Full copy of the current mapping
    pub fn snapshot(&self) -> HashMap<ClientId, Position> {
        self.players.clone()
    }

    /// Insert or overwrite the entry for `id`
    ///
    /// Returns the position it replaced, if any.
    pub fn put(&mut self, id: ClientId, position: Position) -> Option<Position> {
        self.players.insert(id, position)
    }

    /// Remove the entry for `id`
    ///
    /// Removing an absent identifier is a no-op.
    pub fn remove(&mut self, id: &ClientId) -> Option<Position> {
        self.players.remove(id)
    }

    pub fn get(&self, id: &ClientId) -> Option<&Position> {
        self.players.get(id)
    }

    pub fn contains(&self, id: &ClientId) -> bool {
        self.players.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
