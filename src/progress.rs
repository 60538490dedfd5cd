//! Progress fan-out
//!
//! A crawl run produces a stream of progress lines; any number of live
//! subscribers (for example a streaming HTTP response) can listen. Delivery
//! is best-effort and at-most-once: a slow or disconnected subscriber never
//! blocks the producer or the other subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Identifier handed out by [`ProgressBroadcaster::subscribe`].
pub type SubscriberId = u64;

/// Broadcasts progress lines to every registered subscriber channel.
#[derive(Debug, Default)]
pub struct ProgressBroadcaster {
    subscribers: Mutex<HashMap<SubscriberId, UnboundedSender<String>>>,
    next_id: AtomicU64,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber channel and returns its id and receiver.
    pub fn subscribe(&self) -> (SubscriberId, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().unwrap().insert(id, tx);
        (id, rx)
    }

    /// Removes a subscriber, typically on client disconnect.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.lock().unwrap().remove(&id);
    }

    /// Sends `message` to every registered subscriber.
    ///
    /// Channels whose receiver has gone away are pruned here rather than
    /// failing the broadcast.
    pub fn broadcast(&self, message: &str) {
        let mut subscribers = self.subscribers.lock().unwrap();
        let mut closed = Vec::new();
        for (id, tx) in subscribers.iter() {
            if tx.send(message.to_string()).is_err() {
                closed.push(*id);
            }
        }
        for id in closed {
            subscribers.remove(&id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

/// Formats one progress line as a server-sent event frame.
///
/// Embedded newlines are escaped as literal `\n`; no event id or custom
/// event name is used.
pub fn sse_frame(line: &str) -> String {
    format!("data: {}\n\n", line.replace('\n', "\\n"))
}
