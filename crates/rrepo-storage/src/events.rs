//! Mutation event distribution.

use rrepo_core::types::MutationEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of events buffered per subscriber before it lags.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Broadcast bus for [`MutationEvent`]s.
///
/// Cloning yields another handle on the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MutationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Returns the number of subscribers that will see it.
    pub fn publish(&self, event: MutationEvent) -> usize {
        trace!(
            "Publishing {:?} for {} in {}",
            event.change_type, event.path, event.repository_id
        );
        // No subscribers is not an error
        self.sender.send(event).unwrap_or(0)
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
