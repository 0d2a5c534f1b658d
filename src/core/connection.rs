//! WebSocket connection state
//! One `Connection` per live session: its identity, outbound queue, topic set and typing flags

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::queue::{Frame, OutboundQueue, PushError};
use crate::error::Result;

/// Chat identifier used as the fan-out topic
pub type TopicId = u64;

/// Opaque per-session handle, distinct from the user id (one user may hold several sessions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Default)]
struct ConnectionState {
    topics: HashSet<TopicId>,
    typing: HashMap<TopicId, bool>,
}

/// Represents the state of a single WebSocket connection
pub struct Connection {
    id: ConnectionId,
    user_id: String,
    queue: OutboundQueue,
    state: Mutex<ConnectionState>,
    connected_at: Instant,
}

impl Connection {
    /// Create a connection for `user_id`, returning the receiver its writer task drains
    pub fn new(user_id: impl Into<String>, queue_capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (queue, rx) = OutboundQueue::bounded(queue_capacity);
        let connection = Self {
            id: ConnectionId::new(),
            user_id: user_id.into(),
            queue,
            state: Mutex::new(ConnectionState::default()),
            connected_at: Instant::now(),
        };
        (connection, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    // Registry side must be updated in the same critical section, see Hub::subscribe_topic
    pub(crate) fn subscribe(&self, topic: TopicId) -> Result<bool> {
        let mut state = self.state.lock()?;
        Ok(state.topics.insert(topic))
    }

    pub(crate) fn unsubscribe(&self, topic: TopicId) -> Result<bool> {
        let mut state = self.state.lock()?;
        state.typing.remove(&topic);
        Ok(state.topics.remove(&topic))
    }

    /// Drop every subscription and typing flag, returning the topics that were held
    pub(crate) fn clear_topics(&self) -> Result<Vec<TopicId>> {
        let mut state = self.state.lock()?;
        state.typing.clear();
        Ok(state.topics.drain().collect())
    }

    /// Record typing intent for a subscribed topic.
    ///
    /// Returns false, leaving state untouched, when the connection is not
    /// subscribed to `topic`.
    pub fn set_typing(&self, topic: TopicId, is_typing: bool) -> Result<bool> {
        let mut state = self.state.lock()?;
        if !state.topics.contains(&topic) {
            return Ok(false);
        }
        if is_typing {
            state.typing.insert(topic, true);
        } else {
            state.typing.remove(&topic);
        }
        Ok(true)
    }

    pub fn is_typing(&self, topic: TopicId) -> Result<bool> {
        let state = self.state.lock()?;
        Ok(state.typing.get(&topic).copied().unwrap_or(false))
    }

    pub fn is_subscribed(&self, topic: TopicId) -> Result<bool> {
        let state = self.state.lock()?;
        Ok(state.topics.contains(&topic))
    }

    pub fn topics(&self) -> Result<Vec<TopicId>> {
        let state = self.state.lock()?;
        let mut topics: Vec<TopicId> = state.topics.iter().copied().collect();
        topics.sort_unstable();
        Ok(topics)
    }

    /// Non-blocking attempt to queue a frame for the writer task
    pub fn enqueue(&self, frame: Frame) -> std::result::Result<(), PushError> {
        self.queue.try_push(frame)
    }

    /// Close the outbound queue; only the first call has an effect
    pub(crate) fn close(&self) -> bool {
        self.queue.close()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// Calculate the connection duration
    pub fn connection_duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
