//! Outbound events pushed to clients
//!
//! Every event is tagged with a `type` discriminator so clients can route
//! them through a single dispatch.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::connection::TopicId;
use crate::core::queue::Frame;
use crate::error::Result;

/// An already-persisted chat message handed over by the storage layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub chat_id: TopicId,
    pub id: u64,
    pub sender_id: String,
    pub content: String,
    /// Unix seconds
    pub timestamp: i64,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Message(ChatMessage),
    Notification {
        message: String,
    },
    Typing {
        user_id: String,
        chat_id: TopicId,
        is_typing: bool,
        timestamp: i64,
    },
}

impl ServerEvent {
    pub fn notification(message: impl Into<String>) -> Self {
        Self::Notification {
            message: message.into(),
        }
    }

    /// Typing state change stamped with the current time
    pub fn typing(user_id: impl Into<String>, chat_id: TopicId, is_typing: bool) -> Self {
        Self::Typing {
            user_id: user_id.into(),
            chat_id,
            is_typing,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Serialize into a frame ready for the outbound queues
    pub fn encode(&self) -> Result<Frame> {
        let text = serde_json::to_string(self)?;
        Ok(Arc::from(text))
    }
}

impl From<ChatMessage> for ServerEvent {
    fn from(message: ChatMessage) -> Self {
        Self::Message(message)
    }
}
