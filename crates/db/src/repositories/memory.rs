use std::collections::HashMap;

use tokio::sync::RwLock;

use chainflow_core::chain::can_act;
use chainflow_core::domain::item::{ApprovableItem, ItemId};

use super::{ItemRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryItemRepository {
    items: RwLock<HashMap<String, ApprovableItem>>,
}

#[async_trait::async_trait]
impl ItemRepository for InMemoryItemRepository {
    async fn find_by_id(&self, id: &ItemId) -> Result<Option<ApprovableItem>, RepositoryError> {
        let items = self.items.read().await;
        Ok(items.get(&id.0).cloned())
    }

    async fn insert(&self, item: ApprovableItem) -> Result<ApprovableItem, RepositoryError> {
        let mut items = self.items.write().await;
        if items.contains_key(&item.id.0) {
            return Err(RepositoryError::AlreadyExists(item.id.0));
        }
        items.insert(item.id.0.clone(), item.clone());
        Ok(item)
    }

    async fn save_if_version(
        &self,
        mut item: ApprovableItem,
        expected_version: u64,
    ) -> Result<ApprovableItem, RepositoryError> {
        let mut items = self.items.write().await;
        let stored_version = items.get(&item.id.0).map(|stored| stored.version);
        if stored_version != Some(expected_version) {
            return Err(RepositoryError::VersionConflict {
                item_id: item.id.0,
                expected_version,
            });
        }

        item.version = expected_version + 1;
        items.insert(item.id.0.clone(), item.clone());
        Ok(item)
    }

    async fn list_pending_for(&self, email: &str) -> Result<Vec<ApprovableItem>, RepositoryError> {
        let items = self.items.read().await;
        let mut pending: Vec<ApprovableItem> = items
            .values()
            .filter(|item| can_act(&item.chain, email).is_authorized())
            .cloned()
            .collect();
        pending.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.0.cmp(&right.id.0))
        });
        Ok(pending)
    }
}
