//! In-process change feed.
//!
//! The repository publishes a [`ChangeEvent`] after each committed write. Long-poll
//! requests and the push dispatcher subscribe to it; the feed holds no history, so
//! late subscribers reconcile through the stored revision counters.

use tokio::sync::broadcast;

use crate::models::ChangeEvent;

const FEED_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    /// Fan an event out to current subscribers. Having none is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(
            collection = %event.collection,
            revision_id = event.revision_id,
            "change published"
        );
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
