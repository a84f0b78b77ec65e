//! Image slot store
//!
//! Per-item image records keyed by (kind, slot). Every mutation leaves each
//! kind's slots dense (`0..count`) and single-valued kinds at one record at
//! most, so readers never see gaps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{MetaError, Result};
use crate::models::{ImageCandidate, ImageKind, ImageRecord, ImageSource};
use crate::probe::FileProbe;

/// Outcome of `validate_images`
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Records removed because their file is gone
    pub removed: Vec<ImageRecord>,
    /// Probe failures; affected records were kept
    pub warnings: Vec<MetaError>,
}

impl ValidationReport {
    pub fn any_removed(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// Ordered image records of one item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ImageRecord>", into = "Vec<ImageRecord>")]
pub struct ImageSlotStore {
    slots: BTreeMap<ImageKind, Vec<ImageRecord>>,
}

impl ImageSlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn images(&self, kind: ImageKind) -> &[ImageRecord] {
        self.slots.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record at a slot; `None` is the not-found result
    pub fn image(&self, kind: ImageKind, index: usize) -> Option<&ImageRecord> {
        self.images(kind).get(index)
    }

    pub fn has_image(&self, kind: ImageKind, index: usize) -> bool {
        self.image(kind, index).is_some()
    }

    pub fn image_path(&self, kind: ImageKind, index: usize) -> Option<String> {
        self.image(kind, index).map(ImageRecord::path)
    }

    pub fn count(&self, kind: ImageKind) -> usize {
        self.images(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All records, grouped by kind in slot order
    pub fn iter(&self) -> impl Iterator<Item = &ImageRecord> {
        self.slots.values().flatten()
    }

    pub fn primary_image_path(&self) -> Option<String> {
        self.image_path(ImageKind::Primary, 0)
    }

    /// Insert or overwrite the record at a slot
    ///
    /// `index == count` appends. Fails with `InvalidSlot` past the end or at
    /// a non-zero slot of a single-valued kind; the store is untouched then.
    /// Returns whether anything changed.
    pub fn set_image(
        &mut self,
        kind: ImageKind,
        index: usize,
        candidate: ImageCandidate,
    ) -> Result<bool> {
        let count = self.count(kind);
        if index > count || (!kind.allows_multiple() && index > 0) {
            return Err(MetaError::InvalidSlot { kind, index, count });
        }

        let record = ImageRecord::from_candidate(kind, index, &candidate);
        let records = self.slots.entry(kind).or_default();
        if index == count {
            records.push(record);
            return Ok(true);
        }

        if records[index] == record {
            return Ok(false);
        }
        records[index] = record;
        Ok(true)
    }

    /// Add candidate images of one kind
    ///
    /// Multi-valued kinds append unseen sources; single-valued kinds replace
    /// slot 0 with the first candidate. A source already present is left in
    /// place, except that a local record takes a differing `date_modified`
    /// (dimensions reset, since the file was rewritten). Returns whether the
    /// store changed.
    pub fn add_images(&mut self, kind: ImageKind, candidates: &[ImageCandidate]) -> bool {
        if candidates.is_empty() {
            return false;
        }

        if !kind.allows_multiple() {
            if candidates.len() > 1 {
                debug!(
                    kind = %kind,
                    offered = candidates.len(),
                    "Single-valued image kind: using first candidate"
                );
            }
            let candidate = &candidates[0];
            let records = self.slots.entry(kind).or_default();
            if records.is_empty() {
                records.push(ImageRecord::from_candidate(kind, 0, candidate));
                return true;
            }
            let existing = &mut records[0];
            if existing.source.matches(&candidate.source) {
                return refresh_date_modified(existing, candidate);
            }
            *existing = ImageRecord::from_candidate(kind, 0, candidate);
            return true;
        }

        let records = self.slots.entry(kind).or_default();
        let mut changed = false;
        for candidate in candidates {
            match records
                .iter_mut()
                .find(|r| r.source.matches(&candidate.source))
            {
                Some(existing) => changed |= refresh_date_modified(existing, candidate),
                None => {
                    let slot = records.len();
                    records.push(ImageRecord::from_candidate(kind, slot, candidate));
                    changed = true;
                }
            }
        }
        changed
    }

    pub fn remove_image(&mut self, record: &ImageRecord) -> usize {
        self.remove_images(std::slice::from_ref(record))
    }

    /// Remove the given records and shift later slots down
    ///
    /// A target is the stored record at its `slot_index` when the source is
    /// identical there, else the first other record with an identical source.
    /// Each stored record is removed at most once. Returns the number of
    /// records removed.
    pub fn remove_images(&mut self, records: &[ImageRecord]) -> usize {
        let mut removed = 0;
        for kind in ImageKind::ALL {
            let stored = self.images(kind);
            let mut slots: Vec<usize> = Vec::new();
            for target in records.iter().filter(|r| r.kind == kind) {
                let at_slot = stored
                    .get(target.slot_index)
                    .filter(|r| r.source == target.source && !slots.contains(&target.slot_index))
                    .map(|_| target.slot_index);
                let slot = at_slot.or_else(|| {
                    stored
                        .iter()
                        .position(|r| r.source == target.source && !slots.contains(&r.slot_index))
                });
                if let Some(slot) = slot {
                    slots.push(slot);
                }
            }
            removed += self.remove_slots(kind, slots);
        }
        removed
    }

    /// Exchange two slots of a kind; no-op when `first == second`
    pub fn swap_images(&mut self, kind: ImageKind, first: usize, second: usize) -> Result<()> {
        let count = self.count(kind);
        for index in [first, second] {
            if index >= count {
                return Err(MetaError::InvalidSlot { kind, index, count });
            }
        }
        if first == second {
            return Ok(());
        }

        if let Some(records) = self.slots.get_mut(&kind) {
            records.swap(first, second);
        }
        self.densify(kind);
        Ok(())
    }

    /// Drop local records whose files are gone
    ///
    /// Remote records are never probed. A probe failure keeps the record and
    /// yields a `ProbeUnavailable` warning. Removals are applied only after
    /// every probe has answered: on cancellation the store is unchanged and
    /// `Cancelled` is returned.
    pub async fn validate_images(
        &mut self,
        probe: &dyn FileProbe,
        cancel: &CancellationToken,
    ) -> Result<ValidationReport> {
        let local: Vec<ImageRecord> = self
            .iter()
            .filter(|r| r.source.is_local())
            .cloned()
            .collect();

        let mut report = ValidationReport::default();
        let mut missing = Vec::new();

        for record in local {
            let Some(path) = record.source.local_path() else {
                continue;
            };

            let probed = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MetaError::Cancelled),
                result = probe.exists(path) => result,
            };

            match probed {
                Ok(true) => {}
                Ok(false) => {
                    debug!(kind = %record.kind, path = %path.display(), "Image file missing");
                    missing.push(record);
                }
                Err(e) => {
                    warn!(
                        kind = %record.kind,
                        path = %path.display(),
                        error = %e,
                        "Image probe failed, keeping record"
                    );
                    report.warnings.push(MetaError::ProbeUnavailable {
                        path: record.path(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(MetaError::Cancelled);
        }

        for kind in ImageKind::ALL {
            let slots = missing
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| r.slot_index)
                .collect();
            self.remove_slots(kind, slots);
        }
        report.removed = missing;
        Ok(report)
    }

    /// Remove records at the given slots, highest first, then densify
    fn remove_slots(&mut self, kind: ImageKind, mut slots: Vec<usize>) -> usize {
        let Some(records) = self.slots.get_mut(&kind) else {
            return 0;
        };
        slots.sort_unstable_by(|a, b| b.cmp(a));
        slots.dedup();

        let mut removed = 0;
        for slot in slots {
            if slot < records.len() {
                records.remove(slot);
                removed += 1;
            }
        }
        if removed > 0 {
            self.densify(kind);
        }
        removed
    }

    /// Reassign slot indices `0..count`; drop the kind when empty
    fn densify(&mut self, kind: ImageKind) {
        let empty = match self.slots.get_mut(&kind) {
            Some(records) => {
                for (index, record) in records.iter_mut().enumerate() {
                    record.slot_index = index;
                }
                records.is_empty()
            }
            None => false,
        };
        if empty {
            self.slots.remove(&kind);
        }
    }
}

fn refresh_date_modified(existing: &mut ImageRecord, candidate: &ImageCandidate) -> bool {
    if !existing.is_local() || candidate.date_modified.is_none() {
        return false;
    }
    if existing.date_modified == candidate.date_modified {
        return false;
    }
    existing.date_modified = candidate.date_modified;
    existing.width = candidate.width;
    existing.height = candidate.height;
    true
}

impl From<Vec<ImageRecord>> for ImageSlotStore {
    /// Rebuild from persisted records, restoring the slot invariants
    fn from(mut records: Vec<ImageRecord>) -> Self {
        records.sort_by_key(|r| (r.kind, r.slot_index));

        let mut store = ImageSlotStore::default();
        for record in records {
            let kind = record.kind;
            let existing = store.slots.entry(kind).or_default();
            if !kind.allows_multiple() && !existing.is_empty() {
                continue;
            }
            existing.push(record);
        }

        let kinds: Vec<ImageKind> = store.slots.keys().copied().collect();
        for kind in kinds {
            store.densify(kind);
        }
        store
    }
}

impl From<ImageSlotStore> for Vec<ImageRecord> {
    fn from(store: ImageSlotStore) -> Self {
        store.slots.into_values().flatten().collect()
    }
}

/// Slot-0 conveniences layered over the core operations
pub mod defaults {
    use super::*;

    pub fn image_path(store: &ImageSlotStore, kind: ImageKind) -> Option<String> {
        store.image_path(kind, 0)
    }

    pub fn has_image(store: &ImageSlotStore, kind: ImageKind) -> bool {
        store.has_image(kind, 0)
    }

    pub fn set_image(
        store: &mut ImageSlotStore,
        kind: ImageKind,
        candidate: ImageCandidate,
    ) -> Result<bool> {
        store.set_image(kind, 0, candidate)
    }

    /// Set slot 0 from an untyped path or URL
    pub fn set_image_path(store: &mut ImageSlotStore, kind: ImageKind, value: &str) -> Result<bool> {
        store.set_image(kind, 0, ImageCandidate::new(ImageSource::classify(value)))
    }
}
