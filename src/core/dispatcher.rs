//! Hub loop: the single writer for connection lifecycle and the serializer for broadcasts
//!
//! Registration, unregistration and broadcast requests travel over one
//! channel and are applied in arrival order, which is what gives per-topic
//! delivery ordering. Subscriptions do not go through here; inbound loops
//! call `Hub::subscribe_topic` directly under the registry lock.

use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::core::connection::{Connection, ConnectionId, TopicId};
use crate::core::hub::{BroadcastReport, Hub};
use crate::core::queue::Frame;
use crate::error::{HubError, Result};

/// Pending hub requests before producers start waiting
const COMMAND_CAPACITY: usize = 1024;

/// Requests served by the hub loop
pub enum HubCommand {
    Register {
        conn: Arc<Connection>,
        ack: oneshot::Sender<Result<bool>>,
    },
    Unregister {
        id: ConnectionId,
        ack: oneshot::Sender<Result<bool>>,
    },
    Broadcast {
        topic: TopicId,
        payload: Frame,
        ack: oneshot::Sender<Result<BroadcastReport>>,
    },
}

/// Cloneable sender side of the hub loop
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> HubCommand,
    ) -> Result<T> {
        let (ack, reply) = oneshot::channel();
        self.commands
            .send(build(ack))
            .await
            .map_err(|_| HubError::HubStopped)?;
        reply.await.map_err(|_| HubError::HubStopped)?
    }

    /// Register a connection, resolving once the hub has applied it
    pub async fn register(&self, conn: Arc<Connection>) -> Result<bool> {
        self.request(|ack| HubCommand::Register { conn, ack }).await
    }

    /// Tear a connection down through the hub's full cleanup routine
    pub async fn unregister(&self, id: ConnectionId) -> Result<bool> {
        self.request(|ack| HubCommand::Unregister { id, ack }).await
    }

    /// Fan a frame out to a topic; resolves after every subscriber queue was tried
    pub async fn broadcast(&self, topic: TopicId, payload: Frame) -> Result<BroadcastReport> {
        self.request(|ack| HubCommand::Broadcast { topic, payload, ack })
            .await
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

/// Start the hub loop on the current runtime.
///
/// The loop runs until every `HubHandle` is dropped, then tears down any
/// connections still registered.
pub fn spawn(hub: Arc<Hub>) -> (HubHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let task = tokio::spawn(run(hub, rx));
    (HubHandle { commands: tx }, task)
}

async fn run(hub: Arc<Hub>, mut commands: mpsc::Receiver<HubCommand>) {
    debug!("Hub loop started");

    while let Some(command) = commands.recv().await {
        match command {
            HubCommand::Register { conn, ack } => {
                let result = hub.register(conn);
                let _ = ack.send(result);
            }
            HubCommand::Unregister { id, ack } => {
                let result = hub.unregister(id);
                let _ = ack.send(result);
            }
            HubCommand::Broadcast {
                topic,
                payload,
                ack,
            } => {
                let result = hub.broadcast(topic, payload);
                if let Ok(report) = &result {
                    if !report.evicted.is_empty() {
                        info!(
                            "Broadcast to topic {} evicted {} slow connection(s)",
                            topic,
                            report.evicted.len()
                        );
                    }
                }
                let _ = ack.send(result);
            }
        }
    }

    match hub.unregister_all() {
        Ok(count) => info!("Hub loop stopped, closed {} connection(s)", count),
        Err(e) => error!("Hub loop stopped, failed to close connections: {}", e),
    }
}
