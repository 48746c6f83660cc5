use async_trait::async_trait;
use thiserror::Error;

use chainflow_core::domain::item::{ApprovableItem, ItemId};

pub mod item;
pub mod memory;

pub use item::SqlItemRepository;
pub use memory::InMemoryItemRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("item `{0}` already exists")]
    AlreadyExists(String),
    #[error("item `{item_id}` is no longer at version {expected_version}")]
    VersionConflict { item_id: String, expected_version: u64 },
}

/// Storage for approvable items. Writes after the first insert go through
/// `save_if_version` so two concurrent decisions on the same snapshot
/// cannot both land.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn find_by_id(&self, id: &ItemId) -> Result<Option<ApprovableItem>, RepositoryError>;

    async fn insert(&self, item: ApprovableItem) -> Result<ApprovableItem, RepositoryError>;

    /// Stores `item` if the stored copy is still at `expected_version` and
    /// returns it with the bumped version.
    async fn save_if_version(
        &self,
        item: ApprovableItem,
        expected_version: u64,
    ) -> Result<ApprovableItem, RepositoryError>;

    /// Open items whose active step belongs to `email`, oldest first.
    async fn list_pending_for(&self, email: &str) -> Result<Vec<ApprovableItem>, RepositoryError>;
}
