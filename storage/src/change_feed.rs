//! Change notifications for live conversation observers.
//!
//! Writers publish after commit; each observer owns its own broadcast receiver, so dropping one
//! observer never affects another.

use tokio::sync::broadcast;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Conversation(String),
    /// Every conversation changed (e.g. `delete_all`).
    All,
}

impl StoreChange {
    pub fn affects(&self, conversation_id: &str) -> bool {
        match self {
            StoreChange::Conversation(id) => id == conversation_id,
            StoreChange::All => true,
        }
    }
}

#[derive(Clone)]
pub(crate) struct ChangeFeed {
    sender: broadcast::Sender<StoreChange>,
}

impl ChangeFeed {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.sender.subscribe()
    }

    pub(crate) fn publish(&self, change: StoreChange) {
        // No receivers is the common case when nothing is observing.
        let receivers = self.sender.send(change.clone()).unwrap_or(0);
        trace!(?change, receivers, "Published store change");
    }
}
