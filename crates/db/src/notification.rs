use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use chainflow_core::domain::identity::{ApproverRole, Identity};
use chainflow_core::domain::item::{ItemId, ItemKind};
use chainflow_core::domain::status::ItemStatus;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A step became active and is waiting on `recipient`.
    ApproverAssigned {
        item_id: ItemId,
        kind: ItemKind,
        level: u32,
        role: ApproverRole,
        recipient: Identity,
    },
    ItemApproved { item_id: ItemId, kind: ItemKind, status: ItemStatus, recipient: Identity },
    ItemRejected {
        item_id: ItemId,
        kind: ItemKind,
        level: u32,
        comments: Option<String>,
        recipient: Identity,
    },
}

impl Notification {
    pub fn recipient(&self) -> &Identity {
        match self {
            Self::ApproverAssigned { recipient, .. }
            | Self::ItemApproved { recipient, .. }
            | Self::ItemRejected { recipient, .. } => recipient,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ApproverAssigned { .. } => "notification.approver_assigned",
            Self::ItemApproved { .. } => "notification.item_approved",
            Self::ItemRejected { .. } => "notification.item_rejected",
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationDispatcher {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotificationDispatcher {
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationDispatcher for InMemoryNotificationDispatcher {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent.lock().await.push(notification);
        Ok(())
    }
}
