use chrono::{DateTime, Utc};
use sqlx::Row;

use chainflow_core::domain::identity::normalize_email;
use chainflow_core::domain::item::{ApprovableItem, ItemId};

use super::{ItemRepository, RepositoryError};
use crate::DbPool;

/// Items are stored as a JSON payload with the columns needed for lookups
/// (status, active approver, version) lifted out next to it.
pub struct SqlItemRepository {
    pool: DbPool,
}

impl SqlItemRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

struct ItemRow {
    payload: String,
    current_level: Option<i64>,
    current_approver_email: Option<String>,
    amount: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
}

fn to_row(item: &ApprovableItem) -> Result<ItemRow, RepositoryError> {
    let active = item.chain.active_step();
    Ok(ItemRow {
        payload: serde_json::to_string(item)?,
        current_level: active.map(|step| i64::from(step.level)),
        current_approver_email: active
            .and_then(|step| step.approver.as_ref())
            .map(|approver| normalize_email(&approver.email)),
        amount: item.amount.map(|amount| amount.to_string()),
        version: version_to_db(item.version)?,
        created_at: item.created_at.to_rfc3339(),
        updated_at: item.updated_at.to_rfc3339(),
    })
}

fn version_to_db(version: u64) -> Result<i64, RepositoryError> {
    i64::try_from(version)
        .map_err(|_| RepositoryError::Decode(format!("version {version} does not fit in sqlite")))
}

fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovableItem, RepositoryError> {
    let payload: String =
        row.try_get("payload").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let version: i64 =
        row.try_get("version").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let mut item: ApprovableItem = serde_json::from_str(&payload)
        .map_err(|e| RepositoryError::Decode(format!("item payload: {e}")))?;
    item.version = u64::try_from(version)
        .map_err(|_| RepositoryError::Decode(format!("negative version {version}")))?;
    item.updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("updated_at: {e}")))?;

    item.chain
        .validate_invariants()
        .map_err(|e| RepositoryError::Decode(format!("item `{}`: {e}", item.id)))?;
    Ok(item)
}

#[async_trait::async_trait]
impl ItemRepository for SqlItemRepository {
    async fn find_by_id(&self, id: &ItemId) -> Result<Option<ApprovableItem>, RepositoryError> {
        let row = sqlx::query(
            "SELECT payload, version, updated_at FROM approvable_item WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_item(r)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, item: ApprovableItem) -> Result<ApprovableItem, RepositoryError> {
        let row = to_row(&item)?;

        let result = sqlx::query(
            "INSERT INTO approvable_item (id, kind, status, department, amount, current_level,
                                          current_approver_email, version, payload,
                                          created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id.0)
        .bind(item.kind.as_str())
        .bind(item.status.as_str())
        .bind(&item.department)
        .bind(&row.amount)
        .bind(row.current_level)
        .bind(&row.current_approver_email)
        .bind(row.version)
        .bind(&row.payload)
        .bind(&row.created_at)
        .bind(&row.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(item),
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                Err(RepositoryError::AlreadyExists(item.id.0))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn save_if_version(
        &self,
        mut item: ApprovableItem,
        expected_version: u64,
    ) -> Result<ApprovableItem, RepositoryError> {
        item.version = expected_version + 1;
        let row = to_row(&item)?;

        let result = sqlx::query(
            "UPDATE approvable_item
             SET status = ?, amount = ?, current_level = ?, current_approver_email = ?,
                 version = ?, payload = ?, updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(item.status.as_str())
        .bind(&row.amount)
        .bind(row.current_level)
        .bind(&row.current_approver_email)
        .bind(row.version)
        .bind(&row.payload)
        .bind(&row.updated_at)
        .bind(&item.id.0)
        .bind(version_to_db(expected_version)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::VersionConflict { item_id: item.id.0, expected_version });
        }
        Ok(item)
    }

    async fn list_pending_for(&self, email: &str) -> Result<Vec<ApprovableItem>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT payload, version, updated_at
             FROM approvable_item
             WHERE current_approver_email = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(normalize_email(email))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_item).collect::<Result<Vec<_>, _>>()
    }
}
