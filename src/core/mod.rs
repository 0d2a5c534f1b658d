//! Core functionality for the chat hub

pub mod connection;
pub mod dispatcher;
pub mod hub;
pub mod message;
pub mod message_types;
pub mod presence;
pub mod queue;
pub mod server;

// Re-export main components for convenience
pub use connection::{Connection, ConnectionId, TopicId};
pub use dispatcher::HubHandle;
pub use hub::{BroadcastReport, Hub};
pub use message::{ChatMessage, ServerEvent};
pub use message_types::{ClientCommand, ProtocolError};
pub use presence::PresenceTracker;
pub use queue::{Frame, OutboundQueue, PushError};
pub use server::{ChatServer, SharedChatServer};
