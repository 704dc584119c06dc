use tokio::sync::broadcast;
use tracing::trace;

use quad_types::events::ChatEvent;

/// Fan-out bus for realtime events.
///
/// Every connection subscribes to the same broadcast channel and filters the
/// stream against its own topic set, so publishing is a single send no matter
/// how many clients are online.
#[derive(Clone)]
pub struct Dispatcher {
    broadcast_tx: broadcast::Sender<ChatEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self { broadcast_tx }
    }

    /// Subscribe to the event stream. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Publish an event to all connected clients. Fire-and-forget: a send
    /// error only means nobody is connected right now, and the write that
    /// produced the event has already been persisted.
    pub fn publish(&self, event: ChatEvent) {
        if self.broadcast_tx.send(event).is_err() {
            trace!("No gateway receivers, event dropped");
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.broadcast_tx.receiver_count()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
