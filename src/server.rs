//! PresenceServer Actor implementation
//!
//! The central actor that owns all shared state: the position registry and
//! the live connection set. Handlers talk to it through `ServerCommand`s, and
//! every command runs to completion before the next one starts, so each join
//! or leave sequence is atomic with respect to other connections.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::message::ServerMessage;
use crate::peer::Peer;
use crate::registry::Registry;
use crate::types::{ClientId, ConnectionId, Position};

/// Commands sent from handlers to the PresenceServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// A connection announced itself
    Join {
        conn_id: ConnectionId,
        client_id: ClientId,
        position: Position,
        sender: mpsc::UnboundedSender<ServerMessage>,
    },
    /// A joined connection moved
    Move {
        conn_id: ConnectionId,
        position: Position,
    },
    /// A connection closed, joined or not
    Leave {
        conn_id: ConnectionId,
    },
    /// Read the current registry contents
    Snapshot {
        reply: oneshot::Sender<HashMap<ClientId, Position>>,
    },
}

/// The main PresenceServer actor
pub struct PresenceServer {
    /// Last-known position per client
    registry: Registry,
    /// Live connection set: ConnectionId -> Peer
    peers: HashMap<ConnectionId, Peer>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl PresenceServer {
    /// Create a new PresenceServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            registry: Registry::new(),
            peers: HashMap::new(),
            receiver,
        }
    }

    /// Run the PresenceServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("PresenceServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("PresenceServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Join {
                conn_id,
                client_id,
                position,
                sender,
            } => {
                self.handle_join(conn_id, client_id, position, sender);
            }
            ServerCommand::Move { conn_id, position } => {
                self.handle_move(conn_id, position);
            }
            ServerCommand::Leave { conn_id } => {
                self.handle_leave(conn_id);
            }
            ServerCommand::Snapshot { reply } => {
                let _ = reply.send(self.registry.snapshot());
            }
        }
    }

    /// Handle a join announcement
    ///
    /// Order matters: the snapshot is sent before the joiner's entry exists,
    /// and `add` goes out before the joiner is live, so it sees neither
    /// itself in `init` nor its own `add`.
    fn handle_join(
        &mut self,
        conn_id: ConnectionId,
        client_id: ClientId,
        position: Position,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) {
        let peer = Peer::new(conn_id, client_id.clone(), sender);

        let init = ServerMessage::Init {
            players: self.registry.snapshot(),
        };
        if let Err(e) = peer.send(init) {
            warn!("Could not send snapshot to {} ({}): {}", client_id, conn_id, e);
            return;
        }

        self.broadcast(ServerMessage::add(client_id.clone(), position.clone()), None);
        self.peers.insert(conn_id, peer);

        if let Some(previous) = self.registry.put(client_id.clone(), position.clone()) {
            debug!("Client id {} reused, overwriting {}", client_id, previous);
        }

        info!("Client {} joined at {} ({})", client_id, position, conn_id);
        debug!(
            "Live connections: {}, Registered clients: {}",
            self.peers.len(),
            self.registry.len()
        );
    }

    /// Handle a position update from a joined connection
    fn handle_move(&mut self, conn_id: ConnectionId, position: Position) {
        let Some(peer) = self.peers.get(&conn_id) else {
            return;
        };
        let client_id = peer.client_id.clone();

        debug!("Client {} moved to {}", client_id, position);
        self.registry.put(client_id.clone(), position.clone());

        self.broadcast(
            ServerMessage::Update {
                id: client_id,
                target: position.into(),
            },
            Some(conn_id),
        );
    }

    /// Handle connection teardown
    ///
    /// A connection that never joined has nothing to undo.
    fn handle_leave(&mut self, conn_id: ConnectionId) {
        let Some(peer) = self.peers.remove(&conn_id) else {
            debug!("Connection {} closed before joining", conn_id);
            return;
        };
        let client_id = peer.client_id;

        self.registry.remove(&client_id);
        self.broadcast(ServerMessage::Remove { id: client_id.clone() }, None);

        info!("Client {} left ({})", client_id, conn_id);
        debug!(
            "Live connections: {}, Registered clients: {}",
            self.peers.len(),
            self.registry.len()
        );
    }

    /// Best-effort send to every live connection
    ///
    /// A failing peer is logged and skipped. Returns how many peers accepted
    /// the message.
    fn broadcast(&self, msg: ServerMessage, except: Option<ConnectionId>) -> usize {
        let mut delivered = 0;

        for peer in self.peers.values() {
            if Some(peer.conn_id) == except {
                continue;
            }
            match peer.send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    "Dropped {} for {} ({}): {}",
                    msg.kind(),
                    peer.client_id,
                    peer.conn_id,
                    e
                ),
            }
        }

        debug!("Broadcast {} to {} peer(s)", msg.kind(), delivered);
        delivered
    }
}
