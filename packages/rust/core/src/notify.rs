//! Tree change notifications.

use tokio::sync::broadcast;
use tracing::trace;

use crate::tree::NodePath;

/// What changed in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChange {
    /// The children of this node changed.
    Node(NodePath),
    /// The whole tree changed (roots loaded or refreshed).
    All,
}

/// Broadcast channel for [`TreeChange`]s, owned by the explorer.
///
/// Receivers observe `Closed` once the owner is dropped.
#[derive(Debug)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<TreeChange>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeChange> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Send a change to current subscribers. Returns how many received it.
    pub fn notify(&self, change: TreeChange) -> usize {
        trace!(?change, "tree change");
        // No subscribers is not an error.
        self.sender.send(change).unwrap_or(0)
    }
}
