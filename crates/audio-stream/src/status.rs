use audio_stream_types::StreamStatus;
use parking_lot::{Mutex, ReentrantMutex};

use crate::listeners::{ListenerSet, Subscription};

/// One status change as delivered to listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusTransition {
    pub from: StreamStatus,
    pub to: StreamStatus,
    /// Chunk whose preparation caused the change.
    pub chunk_id: u32,
}

/// Shared processing status updated by the encode pipeline.
///
/// Every `set` is published, including repeats caused by overlapping encodes of
/// different chunks; listeners see transitions in the order they happened.
pub struct StatusTracker {
    current: Mutex<StreamStatus>,
    /// Held while listeners run; reentrant so a listener may trigger another encode.
    order: ReentrantMutex<()>,
    listeners: ListenerSet<StatusTransition>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(StreamStatus::Idle),
            order: ReentrantMutex::new(()),
            listeners: ListenerSet::new(),
        }
    }

    /// Latest status (best-effort snapshot).
    pub fn current(&self) -> StreamStatus {
        *self.current.lock()
    }

    /// Record a new status and notify listeners before the next transition can start.
    pub fn set(&self, chunk_id: u32, to: StreamStatus) {
        let _ordered = self.order.lock();
        let from = std::mem::replace(&mut *self.current.lock(), to);
        tracing::trace!(chunk_id, ?from, ?to, "stream status");
        self.listeners.notify(&StatusTransition { from, to, chunk_id });
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatusTransition) + Send + Sync + 'static,
    {
        self.listeners.add(callback)
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}
