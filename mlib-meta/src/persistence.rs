//! Collaborator boundaries
//!
//! The metadata core hands finalized items to an [`ItemRepository`], walks
//! the hierarchy through an [`AncestorProvider`] and obtains candidate
//! metadata from a [`MetadataProvider`]. Implementations live outside the
//! core; [`crate::db::SqliteItemRepository`] is the bundled repository.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use mlib_common::events::UpdateReason;

use crate::error::Result;
use crate::inherited::AncestorInfo;
use crate::merge::{ImageCandidates, MetadataUpdate};
use crate::models::Item;
use crate::refresh::RefreshDecision;

/// Durable item storage
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Persist the item (idempotent upsert)
    ///
    /// Implementations check `cancel` before writing and return
    /// `MetaError::Cancelled` without persisting if it fired.
    async fn update_to_repository(
        &self,
        item: &Item,
        reason: UpdateReason,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn load_item(&self, id: Uuid) -> Result<Option<Item>>;

    async fn load_all(&self) -> Result<Vec<Item>>;

    /// Returns whether a row was deleted
    async fn delete_item(&self, id: Uuid) -> Result<bool>;
}

/// Ancestor chain lookup
#[async_trait]
pub trait AncestorProvider: Send + Sync {
    /// Ancestors of `item`, nearest first
    async fn ancestors(&self, item: &Item) -> Result<Vec<AncestorInfo>>;
}

/// Candidate data produced by a metadata provider
#[derive(Debug, Clone, Default)]
pub struct ProviderResult {
    pub metadata: MetadataUpdate,
    pub images: ImageCandidates,
}

/// External metadata source
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch candidates for a gated refresh; `None` when nothing was found
    async fn fetch(
        &self,
        item: &Item,
        decision: &RefreshDecision,
        cancel: &CancellationToken,
    ) -> Result<Option<ProviderResult>>;
}
