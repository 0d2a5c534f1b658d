//! Chat Hub - real-time presence and message fan-out over WebSockets
//!
//! Clients subscribe to chat topics over a socket and receive messages,
//! typing indicators and notifications published by the rest of the system.
//! Online status is tracked separately through heartbeat-refreshed TTL keys.

pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod storage;

// Re-export main components
pub use config::ServerConfig;
pub use error::{HubError, Result};
pub use handlers::routes;
