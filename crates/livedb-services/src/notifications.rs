//! Fire-and-forget notifications for UI panels

use livedb_core::LiveObjectType;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    SchemaListRefreshed,
    SchemaContentsRefreshed { schema: String },
    /// Detail of a tree object was refetched
    ObjectChanged {
        schema: String,
        object_type: LiveObjectType,
        name: String,
    },
    /// An alter script was applied to the server
    ObjectApplied {
        schema: String,
        object_type: LiveObjectType,
        name: String,
    },
}

/// Broadcast bus; publishing never fails, even with no subscribers
#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn publish(&self, notification: Notification) {
        tracing::trace!(?notification, "publish notification");
        let _ = self.sender.send(notification);
    }
}
