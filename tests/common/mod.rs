// Shared helpers for the integration tests: an in-process server on an
// ephemeral port plus a few WebSocket client conveniences.
#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use chat_hub::config::ServerConfig;
use chat_hub::core::server::{ChatServer, SharedChatServer};
use chat_hub::handlers::routes;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub server: SharedChatServer,
    pub addr: SocketAddr,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::with_config(ServerConfig::default()).await
    }

    pub async fn with_config(config: ServerConfig) -> Self {
        let server = Arc::new(
            ChatServer::with_memory_presence(config).expect("test config must be valid"),
        );
        let (addr, serving) =
            warp::serve(routes(server.clone())).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(serving);
        Self { server, addr }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn connect(&self, user_id: &str) -> Client {
        let url = format!("ws://{}/ws?user_id={}", self.addr, user_id);
        let (ws, _) = connect_async(url).await.expect("WebSocket handshake failed");
        ws
    }

    pub async fn connect_anonymous(&self) -> Client {
        let url = format!("ws://{}/ws", self.addr);
        let (ws, _) = connect_async(url).await.expect("WebSocket handshake failed");
        ws
    }

    /// Wait until the hub has applied `n` subscriptions to `chat_id`
    pub async fn wait_for_subscribers(&self, chat_id: u64, n: usize) {
        let hub = self.server.hub().clone();
        wait_until(move || hub.subscribers(chat_id).unwrap().len() == n).await;
    }

    pub async fn wait_for_connections(&self, n: usize) {
        let hub = self.server.hub().clone();
        wait_until(move || hub.connection_count().unwrap() == n).await;
    }
}

/// Poll `condition` for up to two seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

pub async fn send_json(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string()))
        .await
        .expect("failed to send frame");
}

/// Next text frame as JSON, skipping control frames
pub async fn next_event(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for an event")
            .expect("stream ended")
            .expect("read error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("event is not JSON");
        }
    }
}

/// True if no text frame arrives within a short window
pub async fn stays_quiet(ws: &mut Client) -> bool {
    let deadline = tokio::time::sleep(Duration::from_millis(200));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => return true,
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(_))) => return false,
                Some(Ok(_)) => continue,
                _ => return true,
            },
        }
    }
}
