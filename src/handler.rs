//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, the join
//! announcement, bidirectional communication with the PresenceServer, and
//! teardown.

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

use crate::config::ConnectionConfig;
use crate::error::AppError;
use crate::message::{ClientMessage, JoinMessage, ServerMessage};
use crate::server::ServerCommand;
use crate::types::{ClientId, ConnectionId};

/// Sends `Leave` for its connection when dropped
///
/// Held for the whole life of a handler, so teardown runs on every exit
/// path: normal close, early `?` return, or the task being cancelled.
struct SessionGuard {
    conn_id: ConnectionId,
    cmd_tx: mpsc::Sender<ServerCommand>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let cmd = ServerCommand::Leave {
            conn_id: self.conn_id,
        };
        match self.cmd_tx.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(cmd)) => {
                // Actor is backed up; finish the send off-task
                let cmd_tx = self.cmd_tx.clone();
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move {
                            let _ = cmd_tx.send(cmd).await;
                        });
                    }
                    Err(_) => error!("Lost leave for {}: no runtime", self.conn_id),
                }
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Server closed, skipping leave for {}", self.conn_id);
            }
        }
    }
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, waits for the join announcement,
/// registers with the PresenceServer and pumps messages until either side
/// closes.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: ConnectionConfig,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let conn_id = ConnectionId::new();
    let _guard = SessionGuard {
        conn_id,
        cmd_tx: cmd_tx.clone(),
    };
    debug!("Connection {} open from {}", conn_id, peer_addr);

    // Wait for the join announcement
    let first = match config.join_timeout {
        Some(limit) => tokio::time::timeout(limit, next_payload(&mut ws_receiver))
            .await
            .map_err(|_| AppError::JoinTimeout(limit))??,
        None => next_payload(&mut ws_receiver).await?,
    };
    let Some(payload) = first else {
        debug!("Connection {} closed before joining", conn_id);
        return Ok(());
    };

    let join = JoinMessage::parse(&payload).map_err(|e| {
        warn!("Invalid join message on {}: {}", conn_id, e);
        e
    })?;
    let client_id = join.id.clone();

    // Channel for server -> client messages
    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<ServerMessage>();

    cmd_tx
        .send(ServerCommand::Join {
            conn_id,
            client_id: client_id.clone(),
            position: join.position(),
            sender: msg_tx,
        })
        .await
        .map_err(|_| {
            error!("Failed to register client {} - server closed", client_id);
            AppError::ChannelSend
        })?;

    info!("Client {} connected from {}", client_id, peer_addr);

    // Read task (WebSocket -> ServerCommand)
    let cmd_tx_read = cmd_tx.clone();
    let read_client = client_id.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    if !relay_frame(conn_id, &read_client, text.as_bytes(), &cmd_tx_read).await {
                        break;
                    }
                }
                Ok(Message::Binary(data)) => {
                    if !relay_frame(conn_id, &read_client, &data, &cmd_tx_read).await {
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Client {} sent close frame", read_client);
                    break;
                }
                Ok(_) => {
                    // Ping/pong are answered by tungstenite
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", read_client, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", read_client);
    });

    // Write task (ServerMessage -> WebSocket)
    let write_client = client_id.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize {}: {}", msg.kind(), e);
                }
            }
        }
        debug!("Write task ended for {}", write_client);

        let _ = ws_sender.close().await;
    });

    // The write task ends on its own once the server drops this peer
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", client_id);
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", client_id);
            read_task.abort();
        }
    }

    info!("Client {} disconnected", client_id);

    Ok(())
}

/// Wait for the first data frame
///
/// Returns `None` if the client closes before sending one.
async fn next_payload<S>(ws_receiver: &mut S) -> Result<Option<Vec<u8>>, AppError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(msg) = ws_receiver.next().await {
        match msg? {
            Message::Text(text) => return Ok(Some(text.as_bytes().to_vec())),
            Message::Binary(data) => return Ok(Some(data.to_vec())),
            Message::Close(_) => return Ok(None),
            _ => continue,
        }
    }
    Ok(None)
}

/// Log a post-join frame and forward it if it is a recognized message
///
/// Returns false once the server is gone.
async fn relay_frame(
    conn_id: ConnectionId,
    client_id: &ClientId,
    payload: &[u8],
    cmd_tx: &mpsc::Sender<ServerCommand>,
) -> bool {
    info!("{}: {}", client_id, String::from_utf8_lossy(payload));

    let cmd = match serde_json::from_slice::<ClientMessage>(payload) {
        Ok(ClientMessage::Update { target }) => ServerCommand::Move {
            conn_id,
            position: target.into(),
        },
        Err(_) => return true,
    };

    if cmd_tx.send(cmd).await.is_err() {
        debug!("Server closed, ending read task for {}", client_id);
        return false;
    }
    true
}
