//! Field merge
//!
//! Applies candidate metadata to an item field by field.
//!
//! **Merge strategy:**
//! - Locked fields keep their current value; the candidate is discarded
//! - A present candidate replaces the current value when it differs
//! - An absent candidate never touches the field
//! - `Candidate::Clear` clears only during a full refresh
//!
//! User edits use the same merge with locks bypassed.

use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::error::MetaError;
use crate::models::{ImageCandidate, ImageKind, Item, MetadataField};
use crate::refresh::RefreshDecision;

/// Candidate value for a clearable field
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate<T> {
    Set(T),
    Clear,
}

/// Candidate metadata from a provider or a user edit
///
/// `None` means "no opinion". List fields treat an empty list like
/// `Candidate::Clear`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataUpdate {
    pub name: Option<String>,
    pub original_title: Option<Candidate<String>>,
    pub overview: Option<Candidate<String>>,
    pub production_year: Option<Candidate<i32>>,
    pub run_time_ticks: Option<Candidate<i64>>,
    pub official_rating: Option<Candidate<String>>,
    pub parental_rating_value: Option<Candidate<i32>>,
    pub tags: Option<Vec<String>>,
    pub genres: Option<Vec<String>>,
    pub studios: Option<Vec<String>>,
}

impl MetadataUpdate {
    pub fn is_empty(&self) -> bool {
        *self == MetadataUpdate::default()
    }
}

/// Per-field merge result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Lock tags of fields that changed
    pub changed: BTreeSet<MetadataField>,
    /// Lock tags that discarded a differing candidate
    pub skipped_locked: BTreeSet<MetadataField>,
    /// Name or production year changed
    pub identity_changed: bool,
}

impl MergeOutcome {
    pub fn any_changed(&self) -> bool {
        !self.changed.is_empty()
    }
}

/// Image candidates grouped by kind, as a provider delivers them
pub type ImageCandidates = Vec<(ImageKind, Vec<ImageCandidate>)>;

/// Image merge result
#[derive(Debug, Default)]
pub struct ImageMergeOutcome {
    pub changed_kinds: BTreeSet<ImageKind>,
    /// Kinds refused by a lock (`ImageKindLocked`)
    pub refused: Vec<MetaError>,
}

/// Locked-field aware merger
#[derive(Debug, Clone, Copy)]
pub struct FieldMerger {
    force_full: bool,
    respect_locks: bool,
}

impl FieldMerger {
    /// Merger for refresh-sourced data
    pub fn new(force_full: bool) -> Self {
        Self {
            force_full,
            respect_locks: true,
        }
    }

    pub fn for_decision(decision: &RefreshDecision) -> Self {
        Self::new(decision.force_full)
    }

    /// Merger for user edits: locks bypassed, clears honoured
    pub fn user_edit() -> Self {
        Self {
            force_full: true,
            respect_locks: false,
        }
    }

    pub fn apply(&self, item: &mut Item, update: MetadataUpdate) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if !name.is_empty()
                && name != item.name()
                && self.admit(item, MetadataField::Name, &mut outcome)
            {
                item.set_name(name);
                outcome.changed.insert(MetadataField::Name);
                outcome.identity_changed = true;
            }
        }

        if let Some(next) = self.resolve(&item.original_title, update.original_title) {
            if self.admit(item, MetadataField::Name, &mut outcome) {
                item.original_title = next;
                self.record(item, MetadataField::Name, &mut outcome);
            }
        }

        if let Some(next) = self.resolve(&item.overview, update.overview) {
            if self.admit(item, MetadataField::Overview, &mut outcome) {
                item.overview = next;
                self.record(item, MetadataField::Overview, &mut outcome);
            }
        }

        let year = item.production_year();
        if let Some(next) = self.resolve(&year, update.production_year) {
            if self.admit(item, MetadataField::ProductionYear, &mut outcome) {
                item.set_production_year(next);
                outcome.changed.insert(MetadataField::ProductionYear);
                outcome.identity_changed = true;
            }
        }

        if let Some(next) = self.resolve(&item.run_time_ticks, update.run_time_ticks) {
            if self.admit(item, MetadataField::Runtime, &mut outcome) {
                item.run_time_ticks = next;
                self.record(item, MetadataField::Runtime, &mut outcome);
            }
        }

        if let Some(next) = self.resolve(&item.official_rating, update.official_rating) {
            if self.admit(item, MetadataField::OfficialRating, &mut outcome) {
                item.official_rating = next;
                self.record(item, MetadataField::OfficialRating, &mut outcome);
            }
        }

        let rating = item.parental_rating_value();
        if let Some(next) = self.resolve(&rating, update.parental_rating_value) {
            if self.admit(item, MetadataField::OfficialRating, &mut outcome) {
                item.set_parental_rating_value(next);
                outcome.changed.insert(MetadataField::OfficialRating);
            }
        }

        let tags = item.tags().to_vec();
        if let Some(next) = self.resolve_list(&tags, update.tags) {
            if self.admit(item, MetadataField::Tags, &mut outcome) {
                item.set_tags(next);
                outcome.changed.insert(MetadataField::Tags);
            }
        }

        if let Some(next) = self.resolve_list(&item.genres, update.genres) {
            if self.admit(item, MetadataField::Genres, &mut outcome) {
                item.genres = next;
                self.record(item, MetadataField::Genres, &mut outcome);
            }
        }

        if let Some(next) = self.resolve_list(&item.studios, update.studios) {
            if self.admit(item, MetadataField::Studios, &mut outcome) {
                item.studios = next;
                self.record(item, MetadataField::Studios, &mut outcome);
            }
        }

        if !outcome.skipped_locked.is_empty() {
            debug!(
                item_id = %item.id,
                locked = ?outcome.skipped_locked,
                "Locked fields kept their values"
            );
        }

        outcome
    }

    /// Add provider image candidates, honouring image locks
    ///
    /// Remote candidates are dropped for variants that do not download
    /// remote images.
    pub fn apply_images(&self, item: &mut Item, images: ImageCandidates) -> ImageMergeOutcome {
        let mut outcome = ImageMergeOutcome::default();
        let remote_allowed = item.supports_remote_image_downloading();

        for (kind, candidates) in images {
            if self.respect_locks && item.is_image_kind_locked(kind) {
                warn!(item_id = %item.id, kind = %kind, "Image candidates refused: kind locked");
                outcome.refused.push(MetaError::ImageKindLocked(kind));
                continue;
            }

            let candidates: Vec<ImageCandidate> = candidates
                .into_iter()
                .filter(|c| remote_allowed || c.source.is_local())
                .collect();

            if item.images.add_images(kind, &candidates) {
                outcome.changed_kinds.insert(kind);
            }
        }

        outcome
    }

    /// Next value for a clearable field, or `None` when it stays as is
    fn resolve<T: PartialEq>(
        &self,
        current: &Option<T>,
        candidate: Option<Candidate<T>>,
    ) -> Option<Option<T>> {
        let next = match candidate? {
            Candidate::Set(value) => Some(value),
            Candidate::Clear if self.force_full => None,
            Candidate::Clear => return None,
        };
        if *current == next {
            None
        } else {
            Some(next)
        }
    }

    fn resolve_list(&self, current: &[String], candidate: Option<Vec<String>>) -> Option<Vec<String>> {
        let next = candidate?;
        if next.is_empty() && !self.force_full {
            return None;
        }
        if current == next.as_slice() {
            None
        } else {
            Some(next)
        }
    }

    /// Whether a differing candidate may overwrite `field`
    fn admit(&self, item: &Item, field: MetadataField, outcome: &mut MergeOutcome) -> bool {
        if self.respect_locks && item.is_field_locked(field) {
            outcome.skipped_locked.insert(field);
            return false;
        }
        true
    }

    fn record(&self, item: &mut Item, field: MetadataField, outcome: &mut MergeOutcome) {
        item.mark_changed(field);
        outcome.changed.insert(field);
    }
}
