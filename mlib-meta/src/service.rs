//! Metadata service
//!
//! Owns the live items and runs refresh cycles and image mutation batches
//! against them.
//!
//! **Serialization:** each item sits behind its own `tokio::sync::Mutex`.
//! Refreshes and image batches for the same item take that lock, so at most
//! one runs at a time; distinct items proceed in parallel. The registry lock
//! is only held to look up or insert a handle.
//!
//! **Commit protocol:** work happens on a clone of the item. The clone is
//! persisted first and replaces the live item only after persistence
//! succeeded, so a cancelled or failed operation leaves the live item as it
//! was.

use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mlib_common::events::{CatalogEvent, EventBus};

use crate::error::{MetaError, Result};
use crate::identity::ChangeMagnitude;
use crate::images::{ImageSlotStore, ValidationReport};
use crate::inherited::{InheritedAttributeResolver, InheritedAttributes};
use crate::merge::{FieldMerger, ImageMergeOutcome, MergeOutcome, MetadataUpdate};
use crate::models::{ImageCandidate, ImageKind, ImageRecord, Item, MetadataField};
use crate::persistence::{AncestorProvider, ItemRepository, MetadataProvider, UpdateReason};
use crate::probe::FileProbe;
use crate::refresh::{RefreshContext, RefreshGate};

type ItemHandle = Arc<Mutex<Item>>;

/// Result of a refresh request
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Gate declined; nothing changed
    Skipped,
    /// Cycle executed and was persisted
    Refreshed {
        reason: UpdateReason,
        force_full: bool,
        merge: MergeOutcome,
        images_removed: usize,
        /// Probe failures and lock-refused image kinds
        warnings: Vec<MetaError>,
    },
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed { .. })
    }
}

/// Per-item serialized metadata service
pub struct MetadataService {
    items: RwLock<HashMap<Uuid, ItemHandle>>,
    repository: Arc<dyn ItemRepository>,
    ancestors: Arc<dyn AncestorProvider>,
    probe: Arc<dyn FileProbe>,
    event_bus: EventBus,
}

impl MetadataService {
    pub fn new(
        repository: Arc<dyn ItemRepository>,
        ancestors: Arc<dyn AncestorProvider>,
        probe: Arc<dyn FileProbe>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            repository,
            ancestors,
            probe,
            event_bus,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Add or replace a live item
    pub async fn register(&self, item: Item) -> Uuid {
        let id = item.id;
        self.items
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(item)));
        id
    }

    /// Register every stored item; returns how many were loaded
    pub async fn load_from_repository(&self) -> Result<usize> {
        let stored = self.repository.load_all().await?;
        let count = stored.len();
        let mut items = self.items.write().await;
        for item in stored {
            items.insert(item.id, Arc::new(Mutex::new(item)));
        }
        info!(count, "Loaded items from repository");
        Ok(count)
    }

    pub async fn ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.items.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Copy of the live item
    pub async fn snapshot(&self, id: Uuid) -> Result<Item> {
        let handle = self.handle(id).await?;
        let item = handle.lock().await;
        Ok(item.clone())
    }

    /// Unregister and delete an item; waits for in-flight work on it
    pub async fn remove(&self, id: Uuid) -> Result<bool> {
        let handle = self.handle(id).await?;
        let _guard = handle.lock().await;

        let deleted = self.repository.delete_item(id).await?;
        self.items.write().await.remove(&id);

        self.event_bus.emit_lossy(CatalogEvent::ItemRemoved {
            item_id: id,
            timestamp: Utc::now(),
        });
        info!(item_id = %id, deleted, "Item removed");
        Ok(deleted)
    }

    async fn handle(&self, id: Uuid) -> Result<ItemHandle> {
        self.items
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(MetaError::ItemNotFound(id))
    }

    // ------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------

    /// Run one gated refresh cycle
    ///
    /// **Cycle:**
    /// 1. Gate (`Skipped` when declined; item untouched)
    /// 2. `before_refresh` on a working copy
    /// 3. Provider fetch
    /// 4. Field merge and image candidates (locks honoured)
    /// 5. Image validation
    /// 6. `on_metadata_changed`, `after_refresh`, `date_last_refreshed`
    /// 7. Persist, then commit into the live item
    pub async fn refresh(
        &self,
        id: Uuid,
        ctx: &RefreshContext,
        provider: &dyn MetadataProvider,
        cancel: &CancellationToken,
    ) -> Result<RefreshOutcome> {
        let handle = self.handle(id).await?;
        let mut live = handle.lock().await;

        let decision = RefreshGate::should_refresh(&live, ctx);
        if !decision.proceed {
            self.event_bus.emit_lossy(CatalogEvent::ItemRefreshSkipped {
                item_id: id,
                timestamp: Utc::now(),
            });
            return Ok(RefreshOutcome::Skipped);
        }

        let mut working = live.clone();
        if working.before_refresh() {
            debug!(item_id = %id, "before_refresh normalized item");
        }

        if cancel.is_cancelled() {
            return Err(MetaError::Cancelled);
        }

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(MetaError::Cancelled),
            result = provider.fetch(&working, &decision, cancel) => result?,
        };

        let merger = FieldMerger::for_decision(&decision);
        let mut merge = MergeOutcome::default();
        let mut images = ImageMergeOutcome::default();
        if let Some(result) = fetched {
            merge = merger.apply(&mut working, result.metadata);
            images = merger.apply_images(&mut working, result.images);
        } else {
            debug!(item_id = %id, "Provider returned no candidates");
        }

        let validation = working
            .images
            .validate_images(self.probe.as_ref(), cancel)
            .await?;

        let magnitude = working.on_metadata_changed();
        working.after_refresh();
        working.date_last_refreshed = Some(Utc::now());

        let mut changed_kinds = images.changed_kinds;
        changed_kinds.extend(validation.removed.iter().map(|r| r.kind));
        let reason = match magnitude {
            ChangeMagnitude::None if !changed_kinds.is_empty() => UpdateReason::ImageUpdate,
            other => other.update_reason(false),
        };

        self.persist(&mut working, reason, cancel).await?;
        let counts = image_counts(&working, &changed_kinds);
        *live = working;
        drop(live);

        info!(
            item_id = %id,
            reason = reason.as_str(),
            force_full = decision.force_full,
            changed = ?merge.changed,
            "Refresh cycle completed"
        );

        self.event_bus.emit_lossy(CatalogEvent::ItemRefreshed {
            item_id: id,
            reason,
            force_full: decision.force_full,
            timestamp: Utc::now(),
        });
        self.emit_images_changed(id, &counts);
        self.emit_probe_warnings(id, &validation);

        if merge.changed.contains(&MetadataField::Tags)
            || merge.changed.contains(&MetadataField::OfficialRating)
        {
            self.invalidate_descendants(id).await;
        }

        let mut warnings = validation.warnings;
        warnings.extend(images.refused);

        Ok(RefreshOutcome::Refreshed {
            reason,
            force_full: decision.force_full,
            merge,
            images_removed: validation.removed.len(),
            warnings,
        })
    }

    // ------------------------------------------------------------------
    // User edits and locks
    // ------------------------------------------------------------------

    /// Apply a user edit; locks do not apply to the user
    pub async fn edit_metadata(
        &self,
        id: Uuid,
        update: MetadataUpdate,
        cancel: &CancellationToken,
    ) -> Result<MergeOutcome> {
        let handle = self.handle(id).await?;
        let mut live = handle.lock().await;

        let mut working = live.clone();
        let outcome = FieldMerger::user_edit().apply(&mut working, update);
        let magnitude = working.on_metadata_changed();
        if magnitude == ChangeMagnitude::None {
            return Ok(outcome);
        }

        let reason = magnitude.update_reason(true);
        self.persist(&mut working, reason, cancel).await?;
        *live = working;
        drop(live);

        self.emit_updated(id, reason);
        if outcome.changed.contains(&MetadataField::Tags)
            || outcome.changed.contains(&MetadataField::OfficialRating)
        {
            self.invalidate_descendants(id).await;
        }
        Ok(outcome)
    }

    /// Lock or unlock one field against refresh; returns whether it changed
    pub async fn set_field_lock(
        &self,
        id: Uuid,
        field: MetadataField,
        locked: bool,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.update_locks(id, cancel, |item| {
            if locked {
                item.locked_fields.insert(field)
            } else {
                item.locked_fields.remove(&field)
            }
        })
        .await
    }

    /// Lock or unlock the whole item against refresh
    pub async fn set_item_lock(
        &self,
        id: Uuid,
        locked: bool,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.update_locks(id, cancel, |item| {
            let changed = item.is_locked != locked;
            item.is_locked = locked;
            changed
        })
        .await
    }

    async fn update_locks<F>(&self, id: Uuid, cancel: &CancellationToken, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut Item) -> bool,
    {
        let handle = self.handle(id).await?;
        let mut live = handle.lock().await;

        let mut working = live.clone();
        if !apply(&mut working) {
            return Ok(false);
        }

        self.persist(&mut working, UpdateReason::MetadataEdit, cancel)
            .await?;
        *live = working;
        drop(live);

        self.emit_updated(id, UpdateReason::MetadataEdit);
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Image API
    // ------------------------------------------------------------------

    pub async fn set_image(
        &self,
        id: Uuid,
        kind: ImageKind,
        index: usize,
        candidate: ImageCandidate,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.mutate_images(id, cancel, |images| {
            let changed = images.set_image(kind, index, candidate)?;
            Ok((changed, changed_kinds(changed, [kind])))
        })
        .await
    }

    pub async fn add_images(
        &self,
        id: Uuid,
        kind: ImageKind,
        candidates: Vec<ImageCandidate>,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.mutate_images(id, cancel, |images| {
            let changed = images.add_images(kind, &candidates);
            Ok((changed, changed_kinds(changed, [kind])))
        })
        .await
    }

    /// Returns the number of records removed
    pub async fn remove_images(
        &self,
        id: Uuid,
        records: Vec<ImageRecord>,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        self.mutate_images(id, cancel, |images| {
            let before: Vec<(ImageKind, usize)> = ImageKind::ALL
                .into_iter()
                .map(|kind| (kind, images.count(kind)))
                .collect();
            let removed = images.remove_images(&records);
            let kinds: BTreeSet<ImageKind> = before
                .into_iter()
                .filter(|(kind, count)| images.count(*kind) != *count)
                .map(|(kind, _)| kind)
                .collect();
            Ok((removed, kinds))
        })
        .await
    }

    pub async fn swap_images(
        &self,
        id: Uuid,
        kind: ImageKind,
        first: usize,
        second: usize,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.mutate_images(id, cancel, |images| {
            images.swap_images(kind, first, second)?;
            Ok(((), changed_kinds(first != second, [kind])))
        })
        .await
    }

    /// Validate local images of one item, persisting any removals
    pub async fn validate_images(
        &self,
        id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<ValidationReport> {
        let handle = self.handle(id).await?;
        let mut live = handle.lock().await;

        let mut working = live.clone();
        let report = working
            .images
            .validate_images(self.probe.as_ref(), cancel)
            .await?;
        self.emit_probe_warnings(id, &report);

        if !report.any_removed() {
            return Ok(report);
        }

        self.persist(&mut working, UpdateReason::ImageUpdate, cancel)
            .await?;
        let kinds: BTreeSet<ImageKind> = report.removed.iter().map(|r| r.kind).collect();
        let counts = image_counts(&working, &kinds);
        *live = working;
        drop(live);

        info!(item_id = %id, removed = report.removed.len(), "Removed missing images");
        self.emit_images_changed(id, &counts);
        Ok(report)
    }

    /// Run a synchronous image batch under the item lock
    ///
    /// The closure returns its value and the kinds it changed; nothing is
    /// persisted when no kind changed.
    async fn mutate_images<T, F>(&self, id: Uuid, cancel: &CancellationToken, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut ImageSlotStore) -> Result<(T, BTreeSet<ImageKind>)>,
    {
        let handle = self.handle(id).await?;
        let mut live = handle.lock().await;

        let mut working = live.clone();
        let (value, kinds) = mutate(&mut working.images)?;
        if kinds.is_empty() {
            return Ok(value);
        }

        self.persist(&mut working, UpdateReason::ImageUpdate, cancel)
            .await?;
        let counts = image_counts(&working, &kinds);
        *live = working;
        drop(live);

        self.emit_images_changed(id, &counts);
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Derived reads
    // ------------------------------------------------------------------

    /// Effective parental rating and tags, cached on the live item
    pub async fn inherited_attributes(&self, id: Uuid) -> Result<InheritedAttributes> {
        let handle = self.handle(id).await?;
        let mut live = handle.lock().await;
        InheritedAttributeResolver::resolve(&mut live, self.ancestors.as_ref()).await
    }

    pub async fn presentation_key(&self, id: Uuid) -> Result<String> {
        let handle = self.handle(id).await?;
        let mut live = handle.lock().await;
        Ok(live.presentation_unique_key().to_string())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Stamp `date_last_saved` and hand the item to the repository
    async fn persist(
        &self,
        item: &mut Item,
        reason: UpdateReason,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(MetaError::Cancelled);
        }
        item.date_last_saved = Utc::now();
        self.repository
            .update_to_repository(item, reason, cancel)
            .await
    }

    /// Drop cached inherited attributes of registered descendants
    ///
    /// Called after the own lock is released; children never lock parents.
    async fn invalidate_descendants(&self, id: Uuid) {
        let handles: Vec<ItemHandle> = self.items.read().await.values().cloned().collect();

        let mut frontier = vec![id];
        let mut seen = BTreeSet::from([id]);
        while let Some(parent) = frontier.pop() {
            for handle in &handles {
                let mut item = handle.lock().await;
                if item.parent_id == Some(parent) && seen.insert(item.id) {
                    item.inherited_cache().invalidate();
                    frontier.push(item.id);
                }
            }
        }

        if seen.len() > 1 {
            debug!(item_id = %id, descendants = seen.len() - 1, "Invalidated inherited attributes");
        }
    }

    fn emit_updated(&self, id: Uuid, reason: UpdateReason) {
        self.event_bus.emit_lossy(CatalogEvent::ItemUpdated {
            item_id: id,
            reason,
            timestamp: Utc::now(),
        });
    }

    /// Counts come from the committed item, taken before its lock was released
    fn emit_images_changed(&self, id: Uuid, counts: &[(ImageKind, usize)]) {
        for (kind, count) in counts {
            self.event_bus.emit_lossy(CatalogEvent::ImagesChanged {
                item_id: id,
                image_kind: kind.to_string(),
                count: *count,
                timestamp: Utc::now(),
            });
        }
    }

    fn emit_probe_warnings(&self, id: Uuid, report: &ValidationReport) {
        for warning in &report.warnings {
            if let MetaError::ProbeUnavailable { path, message } = warning {
                warn!(item_id = %id, path = %path, "Image kept: {}", message);
                self.event_bus.emit_lossy(CatalogEvent::ImageProbeFailed {
                    item_id: id,
                    path: path.clone(),
                    error: message.clone(),
                    timestamp: Utc::now(),
                });
            }
        }
    }
}

fn image_counts(item: &Item, kinds: &BTreeSet<ImageKind>) -> Vec<(ImageKind, usize)> {
    kinds
        .iter()
        .map(|kind| (*kind, item.images.count(*kind)))
        .collect()
}

fn changed_kinds(
    changed: bool,
    kinds: impl IntoIterator<Item = ImageKind>,
) -> BTreeSet<ImageKind> {
    if changed {
        kinds.into_iter().collect()
    } else {
        BTreeSet::new()
    }
}
