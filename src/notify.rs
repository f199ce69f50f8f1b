//! Change notifications for views that mirror the mark tree.

use std::path::PathBuf;

use tokio::sync::broadcast;

use crate::models::NodeId;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkEvent {
    /// A node was attached under `parent`.
    Added { node: NodeId, parent: NodeId },
    /// A node was unlinked from `parent`.
    Removed { node: NodeId, parent: NodeId },
    /// A node's fields or direct children changed.
    Edited { node: NodeId },
    /// The whole tree should be redrawn.
    Refreshed,
    /// A save did not reach the disk. The in-memory tree is unaffected.
    SaveFailed { path: PathBuf, message: String },
}

/// Fan-out of [`MarkEvent`]s. Sending with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<MarkEvent>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarkEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: MarkEvent) {
        tracing::trace!(?event, "mark event");
        let _ = self.tx.send(event);
    }

    pub fn added(&self, node: NodeId, parent: NodeId) {
        self.emit(MarkEvent::Added { node, parent });
    }

    pub fn removed(&self, node: NodeId, parent: NodeId) {
        self.emit(MarkEvent::Removed { node, parent });
    }

    pub fn edited(&self, node: NodeId) {
        self.emit(MarkEvent::Edited { node });
    }

    pub fn refresh(&self) {
        self.emit(MarkEvent::Refreshed);
    }

    pub fn save_failed(&self, path: PathBuf, message: impl Into<String>) {
        self.emit(MarkEvent::SaveFailed {
            path,
            message: message.into(),
        });
    }
}
