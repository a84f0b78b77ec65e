//! Item persistence
//!
//! Items are stored as a JSON payload plus indexed projection columns
//! (parent, kind, name, path, presentation key). Writes are upserts keyed by
//! the item guid, so re-saving the same state is harmless.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{MetaError, Result};
use crate::identity::derive_presentation_key;
use crate::inherited::AncestorInfo;
use crate::models::Item;
use crate::persistence::{AncestorProvider, ItemRepository, UpdateReason};

/// SQLite-backed item repository
#[derive(Clone)]
pub struct SqliteItemRepository {
    pool: SqlitePool,
}

impl SqliteItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Last update reason recorded for an item
    pub async fn last_update_reason(&self, id: Uuid) -> Result<Option<String>> {
        let reason: Option<String> =
            sqlx::query_scalar("SELECT last_update_reason FROM items WHERE guid = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(reason)
    }

    /// Stored presentation key column for an item
    pub async fn stored_presentation_key(&self, id: Uuid) -> Result<Option<String>> {
        let key: Option<String> =
            sqlx::query_scalar("SELECT presentation_key FROM items WHERE guid = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(key)
    }

    /// Ids of items whose presentation key equals `key`
    pub async fn find_by_presentation_key(&self, key: &str) -> Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT guid FROM items WHERE presentation_key = ? ORDER BY guid")
            .bind(key)
            .fetch_all(&self.pool)
            .await?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let guid: String = row.get("guid");
            match Uuid::parse_str(&guid) {
                Ok(id) => ids.push(id),
                Err(e) => warn!(guid = %guid, error = %e, "Skipping row with malformed guid"),
            }
        }
        Ok(ids)
    }

    async fn load_payload(&self, id: Uuid) -> Result<Option<Item>> {
        let payload: Option<String> = sqlx::query_scalar("SELECT payload FROM items WHERE guid = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        payload
            .map(|p| serde_json::from_str(&p).map_err(MetaError::from))
            .transpose()
    }
}

#[async_trait]
impl ItemRepository for SqliteItemRepository {
    async fn update_to_repository(
        &self,
        item: &Item,
        reason: UpdateReason,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(MetaError::Cancelled);
        }

        let payload = serde_json::to_string(item)?;
        let presentation_key = derive_presentation_key(item);
        let path = item.path().map(|p| p.to_string_lossy().into_owned());

        sqlx::query(
            r#"
            INSERT INTO items (
                guid, parent_guid, kind, name, path, presentation_key, payload,
                last_update_reason, date_last_saved, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            ON CONFLICT(guid) DO UPDATE SET
                parent_guid = excluded.parent_guid,
                kind = excluded.kind,
                name = excluded.name,
                path = excluded.path,
                presentation_key = excluded.presentation_key,
                payload = excluded.payload,
                last_update_reason = excluded.last_update_reason,
                date_last_saved = excluded.date_last_saved,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(item.id.to_string())
        .bind(item.parent_id.map(|id| id.to_string()))
        .bind(item.policy().kind_name())
        .bind(item.name())
        .bind(path)
        .bind(&presentation_key)
        .bind(payload)
        .bind(reason.as_str())
        .bind(item.date_last_saved.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(
            item_id = %item.id,
            reason = reason.as_str(),
            presentation_key = %presentation_key,
            "Item saved"
        );
        Ok(())
    }

    async fn load_item(&self, id: Uuid) -> Result<Option<Item>> {
        self.load_payload(id).await
    }

    async fn load_all(&self) -> Result<Vec<Item>> {
        let rows = sqlx::query("SELECT guid, payload FROM items ORDER BY created_at, guid")
            .fetch_all(&self.pool)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.get("payload");
            match serde_json::from_str::<Item>(&payload) {
                Ok(item) => items.push(item),
                Err(e) => {
                    let guid: String = row.get("guid");
                    warn!(guid = %guid, error = %e, "Skipping unreadable item payload");
                }
            }
        }
        Ok(items)
    }

    async fn delete_item(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM items WHERE guid = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AncestorProvider for SqliteItemRepository {
    /// Walk `parent_id` links upward; stops at a missing parent or a cycle
    async fn ancestors(&self, item: &Item) -> Result<Vec<AncestorInfo>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([item.id]);
        let mut next = item.parent_id;

        while let Some(parent_id) = next {
            if !seen.insert(parent_id) {
                warn!(item_id = %item.id, parent_id = %parent_id, "Cycle in item hierarchy");
                break;
            }
            let Some(parent) = self.load_payload(parent_id).await? else {
                debug!(item_id = %item.id, parent_id = %parent_id, "Ancestor not stored");
                break;
            };
            chain.push(AncestorInfo::from_item(&parent));
            next = parent.parent_id;
        }

        Ok(chain)
    }
}
