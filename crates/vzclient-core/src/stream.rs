// ── Channel cache subscriptions ──
//
// Snapshot access plus change notification for consumers that render the
// cached channel list and want to redraw when it changes.

use std::sync::Arc;

use tokio::sync::watch;

use crate::model::Channel;

type Snapshot = Arc<Vec<Arc<Channel>>>;

/// A subscription to the [`ChannelStore`](crate::ChannelStore).
pub struct ChannelStream {
    current: Snapshot,
    receiver: watch::Receiver<Snapshot>,
}

impl ChannelStream {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot as of creation or the last [`changed`](Self::changed).
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Wait for the next change. Returns `None` once the store is dropped.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }
}
