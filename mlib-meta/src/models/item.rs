//! Catalog item
//!
//! Identity fields (name, path, production year, provider ids, variant) are
//! private so that every mutation goes through a setter that invalidates the
//! cached presentation key. Own rating and tags are private for the same
//! reason with respect to the inherited-attributes cache.

use chrono::{DateTime, Utc};
use mlib_common::config::LibraryOptions;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use super::fields::MetadataField;
use super::image::ImageKind;
use super::kinds::{ItemKind, ItemPolicy};
use crate::cache::Cached;
use crate::identity::{derive_presentation_key, ChangeMagnitude};
use crate::images::ImageSlotStore;
use crate::inherited::InheritedAttributes;

/// Where an item's content comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    /// Derived from a local file or folder
    Library,
    /// Remote-only content (channels, live streams)
    Remote,
}

/// A single catalog item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    kind: ItemKind,
    pub source_type: SourceType,

    name: String,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    provider_ids: BTreeMap<String, String>,
    #[serde(default)]
    production_year: Option<i32>,

    /// Own explicit numeric parental rating
    #[serde(default)]
    parental_rating_value: Option<i32>,
    #[serde(default)]
    tags: Vec<String>,

    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    /// Run time in 100ns ticks
    #[serde(default)]
    pub run_time_ticks: Option<i64>,
    #[serde(default)]
    pub official_rating: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub studios: Vec<String>,

    #[serde(default)]
    pub locked_fields: BTreeSet<MetadataField>,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_in_mixed_folder: bool,
    #[serde(default)]
    pub preferred_metadata_language: Option<String>,
    #[serde(default)]
    pub preferred_metadata_country_code: Option<String>,

    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub date_last_saved: DateTime<Utc>,
    #[serde(default)]
    pub date_last_refreshed: Option<DateTime<Utc>>,

    #[serde(default)]
    pub images: ImageSlotStore,

    /// Key as of the last `on_metadata_changed`
    #[serde(default, rename = "presentation_unique_key")]
    stored_key: Option<String>,
    #[serde(skip)]
    presentation_key: Cached<String>,
    #[serde(skip)]
    inherited: Cached<InheritedAttributes>,
    #[serde(skip)]
    changed_fields: BTreeSet<MetadataField>,
}

impl Item {
    /// Create an item at discovery time
    pub fn new(
        kind: ItemKind,
        name: impl Into<String>,
        path: Option<PathBuf>,
        source_type: SourceType,
    ) -> Self {
        let now = Utc::now();
        let mut item = Self {
            id: Uuid::new_v4(),
            parent_id: None,
            kind,
            source_type,
            name: name.into(),
            path,
            provider_ids: BTreeMap::new(),
            production_year: None,
            parental_rating_value: None,
            tags: Vec::new(),
            original_title: None,
            overview: None,
            run_time_ticks: None,
            official_rating: None,
            genres: Vec::new(),
            studios: Vec::new(),
            locked_fields: BTreeSet::new(),
            is_locked: false,
            is_in_mixed_folder: false,
            preferred_metadata_language: None,
            preferred_metadata_country_code: None,
            date_created: now,
            date_modified: now,
            date_last_saved: now,
            date_last_refreshed: None,
            images: ImageSlotStore::default(),
            stored_key: None,
            presentation_key: Cached::new(),
            inherited: Cached::new(),
            changed_fields: BTreeSet::new(),
        };
        item.stored_key = Some(item.presentation_unique_key().to_string());
        item
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Attach a provider id at discovery; the metadata core never edits them
    pub fn with_provider_id(mut self, provider: impl Into<String>, id: impl Into<String>) -> Self {
        self.provider_ids.insert(provider.into(), id.into());
        self.presentation_key.invalidate();
        self.stored_key = Some(self.presentation_unique_key().to_string());
        self
    }

    pub fn with_production_year(mut self, year: i32) -> Self {
        self.set_production_year(Some(year));
        self.changed_fields.clear();
        self.stored_key = Some(self.presentation_unique_key().to_string());
        self
    }

    // ------------------------------------------------------------------
    // Identity fields
    // ------------------------------------------------------------------

    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    pub fn policy(&self) -> &dyn ItemPolicy {
        self.kind.policy()
    }


    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.name == name {
            return false;
        }
        self.name = name;
        self.mark_changed(MetadataField::Name);
        true
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: Option<PathBuf>) -> bool {
        if self.path == path {
            return false;
        }
        self.path = path;
        self.presentation_key.invalidate();
        true
    }

    pub fn production_year(&self) -> Option<i32> {
        self.production_year
    }

    pub fn set_production_year(&mut self, year: Option<i32>) -> bool {
        if self.production_year == year {
            return false;
        }
        self.production_year = year;
        self.mark_changed(MetadataField::ProductionYear);
        true
    }

    pub fn provider_ids(&self) -> &BTreeMap<String, String> {
        &self.provider_ids
    }

    pub fn provider_id(&self, provider: &str) -> Option<&str> {
        self.provider_ids.get(provider).map(String::as_str)
    }

    /// Presentation key, recomputed lazily after identity changes
    pub fn presentation_unique_key(&mut self) -> &str {
        if !self.presentation_key.is_valid() {
            let key = derive_presentation_key(self);
            self.presentation_key.set(key);
        }
        self.presentation_key
            .peek()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Recompute derived state after a batch of metadata changes
    ///
    /// `Major` when the presentation key moved, `Minor` when only
    /// descriptive fields changed since the last call, `None` otherwise.
    /// Also invalidates inherited attributes; ancestors signal their own
    /// changes to descendants through this call.
    pub fn on_metadata_changed(&mut self) -> ChangeMagnitude {
        self.presentation_key.invalidate();
        self.inherited.invalidate();

        let key = self.presentation_unique_key().to_string();
        let key_changed = self.stored_key.as_deref() != Some(key.as_str());
        let had_changes = !self.changed_fields.is_empty();

        self.stored_key = Some(key);
        self.changed_fields.clear();

        if key_changed {
            ChangeMagnitude::Major
        } else if had_changes {
            ChangeMagnitude::Minor
        } else {
            ChangeMagnitude::None
        }
    }

    // ------------------------------------------------------------------
    // Inherited-attribute inputs
    // ------------------------------------------------------------------

    pub fn parental_rating_value(&self) -> Option<i32> {
        self.parental_rating_value
    }

    pub fn set_parental_rating_value(&mut self, value: Option<i32>) -> bool {
        if self.parental_rating_value == value {
            return false;
        }
        self.parental_rating_value = value;
        self.mark_changed(MetadataField::OfficialRating);
        true
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn set_tags(&mut self, tags: Vec<String>) -> bool {
        if self.tags == tags {
            return false;
        }
        self.tags = tags;
        self.mark_changed(MetadataField::Tags);
        true
    }

    /// Inherited attributes if the cache is current
    pub fn cached_inherited(&self) -> Option<&InheritedAttributes> {
        self.inherited.peek()
    }

    pub(crate) fn inherited_cache(&mut self) -> &mut Cached<InheritedAttributes> {
        &mut self.inherited
    }

    // ------------------------------------------------------------------
    // Change tracking and locks
    // ------------------------------------------------------------------

    /// Record a descriptive change and invalidate what depends on it
    pub fn mark_changed(&mut self, field: MetadataField) {
        self.changed_fields.insert(field);
        if field.is_identity() {
            self.presentation_key.invalidate();
        }
        if matches!(field, MetadataField::Tags | MetadataField::OfficialRating) {
            self.inherited.invalidate();
        }
    }

    pub fn is_field_locked(&self, field: MetadataField) -> bool {
        self.locked_fields.contains(&field)
    }

    pub fn is_image_kind_locked(&self, kind: ImageKind) -> bool {
        self.is_field_locked(kind.lock_field())
    }

    // ------------------------------------------------------------------
    // Refresh hooks
    // ------------------------------------------------------------------

    /// Item-supplied predicate forcing a refresh
    pub fn requires_refresh(&self) -> bool {
        if self.name.trim().is_empty() {
            return true;
        }
        if self.source_type == SourceType::Library
            && self.policy().expects_provider_ids()
            && self.provider_ids.is_empty()
        {
            return true;
        }
        self.policy().requires_refresh()
    }

    /// Pre-refresh normalization; returns whether it changed anything
    ///
    /// A locked name is left exactly as stored.
    pub fn before_refresh(&mut self) -> bool {
        if self.is_field_locked(MetadataField::Name) {
            return false;
        }
        let trimmed = self.name.trim().to_string();
        if trimmed.is_empty() {
            return match self.file_name_without_extension() {
                Some(stem) => self.set_name(stem),
                None => false,
            };
        }
        self.set_name(trimmed)
    }

    /// Post-refresh hook, called once per completed cycle
    pub fn after_refresh(&mut self) {
        // Ancestors may have been refreshed in the same pass
        self.inherited.invalidate();
        tracing::trace!(item_id = %self.id, "after_refresh");
    }

    // ------------------------------------------------------------------
    // Paths and options
    // ------------------------------------------------------------------

    pub fn file_name_without_extension(&self) -> Option<String> {
        let path = self.path.as_ref()?;
        let name = if self.policy().is_folder() {
            path.file_name()
        } else {
            path.file_stem()
        };
        name.map(|n| n.to_string_lossy().into_owned())
    }

    /// The item's own path for folder-like items, else the parent directory
    pub fn containing_folder_path(&self) -> Option<PathBuf> {
        let path = self.path.as_ref()?;
        if self.policy().is_folder() {
            Some(path.clone())
        } else {
            path.parent().map(Path::to_path_buf)
        }
    }

    /// Local metadata file location
    ///
    /// Items sharing a folder with other media (`is_in_mixed_folder`) use
    /// `<stem>.nfo` beside the media file; others use the variant's fixed
    /// file name in the containing folder.
    pub fn local_metadata_path(&self) -> Option<PathBuf> {
        if self.source_type != SourceType::Library || !self.policy().supports_local_metadata() {
            return None;
        }
        let folder = self.containing_folder_path()?;
        match (self.is_in_mixed_folder, self.policy().local_metadata_file_name()) {
            (false, Some(file_name)) => Some(folder.join(file_name)),
            _ => {
                let stem = self.file_name_without_extension()?;
                Some(folder.join(format!("{}.nfo", stem)))
            }
        }
    }

    /// `<root>/metadata/items/<2 hex>/<id>`
    pub fn internal_metadata_path(&self, root: &Path) -> PathBuf {
        let id = self.id.simple().to_string();
        root.join("metadata").join("items").join(&id[..2]).join(id)
    }

    pub fn always_scan_internal_metadata_path(&self) -> bool {
        self.policy().always_scan_internal_metadata_path()
    }

    pub fn is_owned_item(&self) -> bool {
        self.parent_id.is_some() && self.path.is_none() && self.source_type == SourceType::Library
    }

    pub fn supports_local_metadata(&self) -> bool {
        self.source_type == SourceType::Library && self.policy().supports_local_metadata()
    }

    pub fn supports_people(&self) -> bool {
        self.policy().supports_people()
    }

    pub fn supports_remote_image_downloading(&self) -> bool {
        self.policy().supports_remote_image_downloading()
    }

    pub fn preferred_metadata_language(&self, options: &LibraryOptions) -> String {
        self.preferred_metadata_language
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| options.preferred_metadata_language.clone())
    }

    pub fn preferred_metadata_country_code(&self, options: &LibraryOptions) -> String {
        self.preferred_metadata_country_code
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| options.metadata_country_code.clone())
    }

    pub fn is_save_local_metadata_enabled(&self, options: &LibraryOptions) -> bool {
        options.save_local_metadata && self.supports_local_metadata()
    }

    pub fn is_internet_metadata_enabled(&self, options: &LibraryOptions) -> bool {
        options.enable_internet_providers
    }

    // ------------------------------------------------------------------
    // Convenience reads
    // ------------------------------------------------------------------

    pub fn primary_image_path(&self) -> Option<String> {
        self.images.primary_image_path()
    }

    /// Stored primary image dimensions, else the variant default
    pub fn primary_image_aspect_ratio(&self) -> Option<f64> {
        self.images
            .image(ImageKind::Primary, 0)
            .and_then(|record| record.aspect_ratio())
            .or_else(|| self.policy().default_primary_image_aspect_ratio())
    }

    pub fn run_time(&self) -> Option<Duration> {
        self.run_time_ticks.map(mlib_common::time::ticks_to_duration)
    }
}
