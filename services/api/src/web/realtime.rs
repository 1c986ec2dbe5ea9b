//! services/api/src/web/realtime.rs
//!
//! In-process change notifications. Every mutating handler publishes the
//! collection it touched; WebSocket subscriptions re-query and push a fresh
//! snapshot to the owning user.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// The live-queryable collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Tasks,
    Documents,
    AiTasks,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Tasks, Collection::Documents, Collection::AiTasks];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub user_id: Uuid,
    pub collection: Collection,
}

#[derive(Clone)]
pub struct ChangeHub {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishing with no live subscribers is not an error.
    pub fn publish(&self, user_id: Uuid, collection: Collection) {
        let receivers = self
            .sender
            .send(ChangeEvent {
                user_id,
                collection,
            })
            .unwrap_or(0);
        debug!(%user_id, ?collection, receivers, "Change published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new(256)
    }
}
