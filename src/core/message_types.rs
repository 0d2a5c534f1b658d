//! Inbound envelope decoding
//!
//! Clients send `{"action": ..., "chat_id": "5", ...}`. Decoding never
//! panics and never closes a connection; callers log the error and move on.

use serde::Deserialize;
use std::fmt;

use crate::core::connection::TopicId;

/// Commands a client can issue over its socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    Subscribe { topic: TopicId },
    Unsubscribe { topic: TopicId },
    Heartbeat { is_online: bool },
    Typing { topic: TopicId, is_typing: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    Malformed(String),
    UnknownAction(String),
    MissingField {
        action: &'static str,
        field: &'static str,
    },
    InvalidTopic(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed envelope: {}", msg),
            Self::UnknownAction(action) => write!(f, "unknown action '{}'", action),
            Self::MissingField { action, field } => {
                write!(f, "action '{}' requires field '{}'", action, field)
            }
            Self::InvalidTopic(raw) => write!(f, "invalid chat_id '{}'", raw),
        }
    }
}

impl std::error::Error for ProtocolError {}

// chat_id is a decimal string on the wire; bare numbers are tolerated
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTopic {
    Text(String),
    Number(u64),
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    action: String,
    #[serde(default)]
    chat_id: Option<RawTopic>,
    #[serde(default)]
    is_online: Option<bool>,
    #[serde(default)]
    is_typing: Option<bool>,
}

fn topic(raw: Option<RawTopic>, action: &'static str) -> Result<TopicId, ProtocolError> {
    match raw {
        Some(RawTopic::Number(n)) => Ok(n),
        Some(RawTopic::Text(text)) => text
            .parse::<TopicId>()
            .map_err(|_| ProtocolError::InvalidTopic(text)),
        None => Err(ProtocolError::MissingField {
            action,
            field: "chat_id",
        }),
    }
}

impl ClientCommand {
    /// Decode one text frame
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawEnvelope =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        match raw.action.as_str() {
            "subscribe" => Ok(Self::Subscribe {
                topic: topic(raw.chat_id, "subscribe")?,
            }),
            "unsubscribe" => Ok(Self::Unsubscribe {
                topic: topic(raw.chat_id, "unsubscribe")?,
            }),
            "heartbeat" => {
                let is_online = raw.is_online.ok_or(ProtocolError::MissingField {
                    action: "heartbeat",
                    field: "is_online",
                })?;
                Ok(Self::Heartbeat { is_online })
            }
            "typing" => {
                let topic = topic(raw.chat_id, "typing")?;
                let is_typing = raw.is_typing.ok_or(ProtocolError::MissingField {
                    action: "typing",
                    field: "is_typing",
                })?;
                Ok(Self::Typing { topic, is_typing })
            }
            _ => Err(ProtocolError::UnknownAction(raw.action)),
        }
    }
}
