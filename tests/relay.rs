//! End-to-end tests for the presence relay
//!
//! Each test starts a relay on an ephemeral port and drives it with real
//! tokio-tungstenite clients.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use presence_relay::{
    accept_loop, spawn_server, ClientId, Config, ConnectionConfig, Position, ServerCommand,
};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET_PERIOD: Duration = Duration::from_millis(200);

struct Relay {
    url: String,
    cmd_tx: mpsc::Sender<ServerCommand>,
}

impl Relay {
    async fn start() -> Self {
        Self::start_with(Config::default().connection()).await
    }

    async fn start_with(conn_config: ConnectionConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cmd_tx = spawn_server(&Config::default());
        tokio::spawn(accept_loop(listener, cmd_tx.clone(), conn_config));
        Self {
            url: format!("ws://{}", addr),
            cmd_tx,
        }
    }

    async fn connect(&self) -> Ws {
        connect_async(self.url.as_str()).await.unwrap().0
    }

    /// Connect, announce, and return the socket with its `init` message
    async fn join(&self, id: &str, x: i64, y: i64, z: i64) -> (Ws, Value) {
        let mut ws = self.connect().await;
        send_json(&mut ws, json!({"type": "init", "id": id, "x": x, "y": y, "z": z})).await;
        let init = recv_json(&mut ws).await;
        (ws, init)
    }

    async fn snapshot(&self) -> HashMap<ClientId, Position> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(ServerCommand::Snapshot { reply })
            .await
            .unwrap();
        rx.await.unwrap()
    }
}

async fn send_json(ws: &mut Ws, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn recv_json(ws: &mut Ws) -> Value {
    loop {
        let msg = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Assert no data frame arrives for a short while
async fn assert_silent(ws: &mut Ws) {
    match timeout(QUIET_PERIOD, ws.next()).await {
        Err(_) => {}
        Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected message: {}", text),
        Ok(other) => panic!("unexpected stream event: {:?}", other),
    }
}

/// Assert the server closes the connection
async fn assert_closed(ws: &mut Ws) {
    loop {
        match timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("connection was not closed")
        {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(Message::Text(text))) => panic!("unexpected message: {}", text),
            Some(Ok(_)) => continue,
        }
    }
}

#[tokio::test]
async fn first_client_gets_empty_snapshot() {
    let relay = Relay::start().await;
    let (mut a, init) = relay.join("a", 1, 2, 3).await;

    assert_eq!(init, json!({"type": "init", "players": {}}));
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn second_client_sees_first_and_first_sees_add() {
    let relay = Relay::start().await;
    let (mut a, _) = relay.join("a", 1, 2, 3).await;
    let (mut b, init_b) = relay.join("b", 4, 5, 6).await;

    assert_eq!(init_b, json!({"type": "init", "players": {"a": [1, 2, 3]}}));
    assert_eq!(
        recv_json(&mut a).await,
        json!({"type": "add", "id": "b", "x": 4, "y": 5, "z": 6})
    );
    // No echo of its own add
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn disconnect_broadcasts_remove_and_leaves_snapshot() {
    let relay = Relay::start().await;
    let (mut a, _) = relay.join("a", 1, 2, 3).await;
    let (mut b, _) = relay.join("b", 4, 5, 6).await;
    recv_json(&mut a).await;

    a.close(None).await.unwrap();
    assert_eq!(recv_json(&mut b).await, json!({"type": "remove", "id": "a"}));

    let (_c, init_c) = relay.join("c", 7, 8, 9).await;
    assert_eq!(init_c, json!({"type": "init", "players": {"b": [4, 5, 6]}}));
}

#[tokio::test]
async fn silent_client_never_announced() {
    let relay = Relay::start().await;
    let (mut a, _) = relay.join("a", 1, 2, 3).await;

    let mut d = relay.connect().await;
    d.close(None).await.unwrap();

    assert_silent(&mut a).await;
    let snapshot = relay.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.contains_key(&ClientId::from("a")));
}

#[tokio::test]
async fn duplicate_id_overwrites_without_notice() {
    let relay = Relay::start().await;
    let (mut f, _) = relay.join("x", 1, 1, 1).await;
    let (_e, init_e) = relay.join("x", 2, 2, 2).await;

    assert_eq!(init_e, json!({"type": "init", "players": {"x": [1, 1, 1]}}));
    // F only learns that some client "x" was added
    assert_eq!(
        recv_json(&mut f).await,
        json!({"type": "add", "id": "x", "x": 2, "y": 2, "z": 2})
    );

    let (_g, init_g) = relay.join("g", 0, 0, 0).await;
    assert_eq!(init_g, json!({"type": "init", "players": {"x": [2, 2, 2]}}));
}

#[tokio::test]
async fn shared_id_leave_removes_entry() {
    let relay = Relay::start().await;
    let (mut f, _) = relay.join("x", 1, 1, 1).await;
    let (mut e, _) = relay.join("x", 2, 2, 2).await;
    let (mut g, _) = relay.join("g", 0, 0, 0).await;
    recv_json(&mut f).await;
    recv_json(&mut f).await;
    recv_json(&mut e).await;

    f.close(None).await.unwrap();

    let remove = json!({"type": "remove", "id": "x"});
    assert_eq!(recv_json(&mut e).await, remove);
    assert_eq!(recv_json(&mut g).await, remove);
    assert!(!relay.snapshot().await.contains_key(&ClientId::from("x")));
}

#[tokio::test]
async fn snapshot_never_contains_self() {
    let relay = Relay::start().await;
    let mut sockets = Vec::new();
    for id in ["p1", "p2", "p3", "p4"] {
        let (ws, init) = relay.join(id, 0, 0, 0).await;
        let players = init["players"].as_object().unwrap();
        assert!(!players.contains_key(id));
        assert_eq!(players.len(), sockets.len());
        sockets.push(ws);
    }
}

#[tokio::test]
async fn malformed_join_is_isolated() {
    let relay = Relay::start().await;
    let (mut b, _) = relay.join("b", 4, 5, 6).await;

    let mut a = relay.connect().await;
    send_json(&mut a, json!({"id": "a", "x": 1})).await;
    assert_closed(&mut a).await;

    let mut junk = relay.connect().await;
    junk.send(Message::Text("not json".into())).await.unwrap();
    assert_closed(&mut junk).await;

    assert_silent(&mut b).await;
    let snapshot = relay.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.contains_key(&ClientId::from("b")));
}

#[tokio::test]
async fn update_relayed_to_peers_only() {
    let relay = Relay::start().await;
    let (mut a, _) = relay.join("a", 1, 2, 3).await;
    let (mut b, _) = relay.join("b", 4, 5, 6).await;
    recv_json(&mut a).await;

    send_json(
        &mut a,
        json!({"type": "update", "id": "a", "target": {"x": 10, "y": 0, "z": -5}}),
    )
    .await;

    assert_eq!(
        recv_json(&mut b).await,
        json!({"type": "update", "id": "a", "target": {"x": 10, "y": 0, "z": -5}})
    );
    assert_silent(&mut a).await;

    let (_c, init_c) = relay.join("c", 0, 0, 0).await;
    assert_eq!(init_c["players"]["a"], json!([10, 0, -5]));
}

#[tokio::test]
async fn unrecognized_messages_are_only_observed() {
    let relay = Relay::start().await;
    let (mut a, _) = relay.join("a", 1, 2, 3).await;
    let (mut b, _) = relay.join("b", 4, 5, 6).await;
    recv_json(&mut a).await;

    send_json(&mut a, json!({"type": "chat", "content": "hello"})).await;
    b.send(Message::Text("plain text".into())).await.unwrap();

    assert_silent(&mut a).await;
    assert_silent(&mut b).await;
    assert_eq!(relay.snapshot().await.len(), 2);
}

#[tokio::test]
async fn join_timeout_drops_silent_client() {
    let relay = Relay::start_with(ConnectionConfig {
        join_timeout: Some(Duration::from_millis(100)),
    })
    .await;

    let mut d = relay.connect().await;
    assert_closed(&mut d).await;
    assert!(relay.snapshot().await.is_empty());
}

#[tokio::test]
async fn float_coordinates_round_trip() {
    let relay = Relay::start().await;
    let mut a = relay.connect().await;
    send_json(&mut a, json!({"id": "a", "x": 1.5, "y": -0.25, "z": 3})).await;
    recv_json(&mut a).await;

    let (_b, init_b) = relay.join("b", 0, 0, 0).await;
    assert_eq!(init_b["players"]["a"], json!([1.5, -0.25, 3]));
}
