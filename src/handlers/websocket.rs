use futures_util::sink::SinkExt;
use futures_util::stream::{SplitSink, SplitStream, StreamExt};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use warp::ws::{Message, WebSocket};

use crate::core::connection::{Connection, ConnectionId};
use crate::core::message_types::ClientCommand;
use crate::core::queue::Frame;
use crate::core::server::SharedChatServer;
use crate::error::Result;

// Handle a WebSocket connection for `user_id` until either of its loops ends
pub async fn handle_ws_client(ws: WebSocket, user_id: String, server: SharedChatServer) {
    let config = server.config().clone();
    let (conn, queue) = Connection::new(user_id, config.queue_capacity);
    let conn = Arc::new(conn);
    let conn_id = conn.id();

    match server.handle().register(conn.clone()).await {
        Ok(true) => info!("Client connected: {} (user {})", conn_id, conn.user_id()),
        Ok(false) => {
            warn!("Connection {} was closed before registration", conn_id);
            return;
        }
        Err(e) => {
            error!("Failed to register connection {}: {}", conn_id, e);
            return;
        }
    }

    let (ws_tx, ws_rx) = ws.split();
    let mut writer = tokio::spawn(write_loop(
        ws_tx,
        queue,
        conn_id,
        config.ping_interval,
        config.write_timeout,
    ));

    // Whichever loop finishes first ends the session
    let writer_finished = tokio::select! {
        _ = read_loop(ws_rx, &conn, &server, config.read_timeout) => false,
        _ = &mut writer => true,
    };

    // Same teardown for every exit path; closing the queue lets the writer drain and stop
    match server.handle().unregister(conn_id).await {
        Ok(true) => info!(
            "Client disconnected: {} after {:?}",
            conn_id,
            conn.connection_duration()
        ),
        Ok(false) => debug!("Connection {} was already torn down", conn_id),
        Err(e) => {
            error!("Failed to unregister connection {}: {}", conn_id, e);
            conn.close();
        }
    }

    if !writer_finished {
        if let Err(e) = writer.await {
            error!("Writer task for {} failed: {}", conn_id, e);
        }
    }
}

async fn read_loop(
    mut ws_rx: SplitStream<WebSocket>,
    conn: &Connection,
    server: &SharedChatServer,
    read_timeout: Duration,
) {
    loop {
        // Any inbound frame, pongs included, restarts the idle window
        let msg = match timeout(read_timeout, ws_rx.next()).await {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(e))) => {
                debug!("WebSocket read error on {}: {}", conn.id(), e);
                break;
            }
            Ok(None) => break,
            Err(_) => {
                info!("Connection {} idle for {:?}, closing", conn.id(), read_timeout);
                break;
            }
        };

        if msg.is_close() {
            break;
        }
        if msg.is_ping() || msg.is_pong() {
            continue;
        }

        // Only process text messages
        match msg.to_str() {
            Ok(text) => {
                // Malformed or rejected frames are logged and dropped, the connection stays up
                if let Err(e) = process_message(text, conn, server).await {
                    warn!("Ignoring frame from {}: {}", conn.id(), e);
                }
            }
            Err(_) => warn!(
                "Ignoring non-text frame from {} ({} bytes)",
                conn.id(),
                msg.as_bytes().len()
            ),
        }
    }
}

async fn process_message(text: &str, conn: &Connection, server: &SharedChatServer) -> Result<()> {
    let command = ClientCommand::decode(text)?;
    server.handle_command(conn, command).await
}

async fn send_with_deadline(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    message: Message,
    deadline: Duration,
    conn_id: ConnectionId,
) -> bool {
    match timeout(deadline, ws_tx.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!("WebSocket write error on {}: {}", conn_id, e);
            false
        }
        Err(_) => {
            warn!("Write to {} exceeded {:?}, dropping consumer", conn_id, deadline);
            false
        }
    }
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut queue: mpsc::Receiver<Frame>,
    conn_id: ConnectionId,
    ping_interval: Duration,
    write_timeout: Duration,
) {
    let mut keepalive = interval_at(Instant::now() + ping_interval, ping_interval);

    loop {
        tokio::select! {
            frame = queue.recv() => match frame {
                Some(frame) => {
                    let message = Message::text(frame.to_string());
                    if !send_with_deadline(&mut ws_tx, message, write_timeout, conn_id).await {
                        break;
                    }
                }
                None => {
                    // Queue closed by teardown
                    let _ = timeout(write_timeout, ws_tx.send(Message::close())).await;
                    break;
                }
            },
            _ = keepalive.tick() => {
                if !send_with_deadline(&mut ws_tx, Message::ping(Vec::new()), write_timeout, conn_id).await {
                    break;
                }
            }
        }
    }

    debug!("Writer for {} stopped", conn_id);
}
