pub mod connection;
pub mod migrations;
pub mod notification;
pub mod repositories;
pub mod service;

pub use connection::{connect_with_config, connect_with_settings, DbPool};
pub use notification::{InMemoryNotificationDispatcher, Notification, NotificationDispatcher};
pub use repositories::{InMemoryItemRepository, ItemRepository, RepositoryError, SqlItemRepository};
pub use service::{ApprovalService, DecisionRequest};
