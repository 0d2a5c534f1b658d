//! Integrated server service tying the hub, its loop and presence tracking together

use log::debug;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::connection::{Connection, TopicId};
use crate::core::dispatcher::{self, HubHandle};
use crate::core::hub::{BroadcastReport, Hub};
use crate::core::message::{ChatMessage, ServerEvent};
use crate::core::message_types::ClientCommand;
use crate::core::presence::PresenceTracker;
use crate::error::Result;
use crate::storage::{MemoryPresenceStore, PresenceStore};

/// Everything a connection handler or HTTP endpoint needs, injected rather than global
pub struct ChatServer {
    hub: Arc<Hub>,
    handle: HubHandle,
    presence: PresenceTracker,
    config: ServerConfig,
}

impl ChatServer {
    /// Create a server on top of an existing presence store.
    /// Must be called from within a Tokio runtime; the hub loop is spawned here and
    /// stops once the server and every cloned handle are dropped.
    pub fn new(config: ServerConfig, store: Arc<dyn PresenceStore>) -> Result<Self> {
        config.validate()?;

        let hub = Arc::new(Hub::new());
        let (handle, _hub_task) = dispatcher::spawn(hub.clone());
        let presence = PresenceTracker::new(store, config.presence_ttl);

        Ok(Self {
            hub,
            handle,
            presence,
            config,
        })
    }

    /// Create with the in-memory presence store and its expiry sweep.
    /// The sweep stops once the server releases the store.
    pub fn with_memory_presence(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(MemoryPresenceStore::new());
        store.clone().start_cleanup_task(config.presence_sweep_interval);
        Self::new(config, store)
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn handle(&self) -> &HubHandle {
        &self.handle
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Fan a persisted message out to its chat
    pub async fn publish_message(&self, message: ChatMessage) -> Result<BroadcastReport> {
        let topic = message.chat_id;
        let frame = ServerEvent::from(message).encode()?;
        self.handle.broadcast(topic, frame).await
    }

    /// Fan a typing state change out to its chat
    pub async fn publish_typing(
        &self,
        user_id: &str,
        topic: TopicId,
        is_typing: bool,
    ) -> Result<BroadcastReport> {
        let frame = ServerEvent::typing(user_id, topic, is_typing).encode()?;
        self.handle.broadcast(topic, frame).await
    }

    /// Best-effort notification to every session of a user
    pub fn notify_user(&self, user_id: &str, message: &str) -> Result<usize> {
        let frame = ServerEvent::notification(message).encode()?;
        self.hub.notify_user(user_id, frame)
    }

    /// Apply a decoded client command on behalf of `conn`
    pub async fn handle_command(&self, conn: &Connection, command: ClientCommand) -> Result<()> {
        match command {
            ClientCommand::Subscribe { topic } => {
                if self.hub.subscribe_topic(conn, topic)? {
                    debug!("Connection {} subscribed to chat {}", conn.id(), topic);
                }
            }
            ClientCommand::Unsubscribe { topic } => {
                if self.hub.unsubscribe_topic(conn, topic)? {
                    debug!("Connection {} unsubscribed from chat {}", conn.id(), topic);
                }
            }
            ClientCommand::Heartbeat { is_online: true } => {
                self.presence.touch(conn.user_id()).await?;
            }
            ClientCommand::Heartbeat { is_online: false } => {
                self.presence.set_offline(conn.user_id()).await?;
                debug!("User {} reported offline", conn.user_id());
            }
            ClientCommand::Typing { topic, is_typing } => {
                if conn.set_typing(topic, is_typing)? {
                    let report = self.publish_typing(conn.user_id(), topic, is_typing).await?;
                    debug!(
                        "Typing update from {} in chat {} reached {} connection(s)",
                        conn.user_id(),
                        topic,
                        report.delivered
                    );
                } else {
                    debug!(
                        "Ignoring typing update from {} for unsubscribed chat {}",
                        conn.id(),
                        topic
                    );
                }
            }
        }
        Ok(())
    }

    /// Connection and active-topic counts
    pub fn stats(&self) -> Result<(usize, usize)> {
        Ok((self.hub.connection_count()?, self.hub.topic_count()?))
    }
}

// Shared reference to the chat server
pub type SharedChatServer = Arc<ChatServer>;
