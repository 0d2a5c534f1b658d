//! Bounded outbound queue between the hub and a connection's writer task

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// A serialized outbound frame. Shared so one broadcast payload is not copied per subscriber.
pub type Frame = Arc<str>;

/// Why a frame could not be queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The consumer is not keeping up
    Full,
    /// The queue was closed by teardown
    Closed,
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "outbound queue is full"),
            Self::Closed => write!(f, "outbound queue is closed"),
        }
    }
}

impl std::error::Error for PushError {}

/// Producer side of a connection's outbound queue.
///
/// The only sender lives inside the `Option`; `close` takes it out, so the
/// receiving writer task observes end-of-stream once the remaining frames
/// are drained. Closing twice is a no-op.
pub struct OutboundQueue {
    sender: Mutex<Option<mpsc::Sender<Frame>>>,
}

impl OutboundQueue {
    /// Create a queue holding at most `capacity` frames, returning the consumer half
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Self {
            sender: Mutex::new(Some(tx)),
        };
        (queue, rx)
    }

    // The guarded value is a plain Option, a poisoned lock cannot leave it half-updated
    fn sender(&self) -> MutexGuard<'_, Option<mpsc::Sender<Frame>>> {
        self.sender.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Non-blocking push
    pub fn try_push(&self, frame: Frame) -> Result<(), PushError> {
        let guard = self.sender();
        let sender = guard.as_ref().ok_or(PushError::Closed)?;
        sender.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => PushError::Full,
            TrySendError::Closed(_) => PushError::Closed,
        })
    }

    /// Close the queue. Returns true only for the call that actually closed it.
    pub fn close(&self) -> bool {
        self.sender().take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.sender().is_none()
    }
}
