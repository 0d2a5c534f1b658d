use std::error::Error;
use std::fmt;
use std::sync::PoisonError;

use crate::core::message_types::ProtocolError;

#[derive(Debug)]
pub enum HubError {
    // Registry errors
    Lock(String),
    NotRegistered(String),

    // Hub loop is gone (all handles dropped or task panicked)
    HubStopped,

    // Presence store errors
    PresenceError(String),

    // Message errors
    MessageParseError(String),
    SerializationError(String),

    // Validation errors
    ValidationError(String),

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lock(msg) => write!(f, "Registry lock error: {}", msg),
            Self::NotRegistered(id) => write!(f, "Connection is not registered: {}", id),
            Self::HubStopped => write!(f, "Hub loop is not running"),
            Self::PresenceError(msg) => write!(f, "Presence store error: {}", msg),
            Self::MessageParseError(msg) => write!(f, "Message parse error: {}", msg),
            Self::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for HubError {}

// Poisoned registry or connection locks surface as lock errors
impl<T> From<PoisonError<T>> for HubError {
    fn from(err: PoisonError<T>) -> Self {
        HubError::Lock(format!("Lock poisoned: {}", err))
    }
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::SerializationError(err.to_string())
    }
}

impl From<ProtocolError> for HubError {
    fn from(err: ProtocolError) -> Self {
        HubError::MessageParseError(err.to_string())
    }
}

// Generic result type for the hub
pub type Result<T> = std::result::Result<T, HubError>;
