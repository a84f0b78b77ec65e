//! Presentation key derivation
//!
//! The presentation key identifies "the same thing to show" across
//! restarts: downstream indexes are keyed by it, so it is a pure function of
//! persisted identity fields with no random or time-based component.

use mlib_common::events::UpdateReason;
use sha2::{Digest, Sha256};

use crate::models::{Item, SourceType};

/// Length of the hex key (128 bits of the digest)
pub const PRESENTATION_KEY_LEN: usize = 32;

/// Magnitude of a metadata change, returned by `Item::on_metadata_changed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeMagnitude {
    None,
    /// Descriptive fields changed, identity unchanged
    Minor,
    /// Presentation key changed
    Major,
}

impl ChangeMagnitude {
    /// Update reason for persistence
    ///
    /// Identity changes are always recorded as imports; descriptive changes
    /// keep the origin of the change.
    pub fn update_reason(self, user_edit: bool) -> UpdateReason {
        match self {
            ChangeMagnitude::None => UpdateReason::None,
            ChangeMagnitude::Minor if user_edit => UpdateReason::MetadataEdit,
            ChangeMagnitude::Minor | ChangeMagnitude::Major => UpdateReason::MetadataImport,
        }
    }
}

/// Derive the presentation key of an item
///
/// Canonical input, one `key=value` line each:
/// - `kind`: variant tag
/// - `name`: trimmed, lower-cased
/// - `year`: production year, for variants that use it
/// - `part`: variant disambiguators (series / season / episode numbers)
/// - `path`: library items: the content path
/// - `provider`: remote items: provider ids in sorted order
pub fn derive_presentation_key(item: &Item) -> String {
    let policy = item.policy();
    let mut canonical = String::new();

    push_line(&mut canonical, "kind", policy.kind_name());
    push_line(&mut canonical, "name", &item.name().trim().to_lowercase());

    if policy.uses_production_year() {
        if let Some(year) = item.production_year() {
            push_line(&mut canonical, "year", &year.to_string());
        }
    }

    for part in policy.identity_parts() {
        push_line(&mut canonical, "part", &part);
    }

    match item.source_type {
        SourceType::Library => {
            if let Some(path) = item.path() {
                push_line(&mut canonical, "path", &path.to_string_lossy());
            }
        }
        SourceType::Remote => {
            // BTreeMap iteration is sorted, so insertion order never matters
            for (provider, id) in item.provider_ids() {
                push_line(
                    &mut canonical,
                    "provider",
                    &format!("{}:{}", provider.to_lowercase(), id),
                );
            }
        }
    }

    let digest = Sha256::digest(canonical.as_bytes());
    let mut key = format!("{:x}", digest);
    key.truncate(PRESENTATION_KEY_LEN);
    key
}

fn push_line(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push('=');
    out.push_str(value);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EpisodeInfo, ItemKind, MetadataField};
    use std::path::PathBuf;

    fn movie() -> Item {
        Item::new(
            ItemKind::movie(),
            "Alien",
            Some(PathBuf::from("/media/movies/Alien (1979)/alien.mkv")),
            SourceType::Library,
        )
        .with_production_year(1979)
    }

    #[test]
    fn test_key_is_deterministic() {
        let item = movie();
        let first = derive_presentation_key(&item);
        let second = derive_presentation_key(&item);
        assert_eq!(first, second);
        assert_eq!(first.len(), PRESENTATION_KEY_LEN);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_key_stable_across_clones_and_serde() {
        let item = movie();
        let json = serde_json::to_string(&item).unwrap();
        let back: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(derive_presentation_key(&item), derive_presentation_key(&back));
    }

    #[test]
    fn test_tag_change_keeps_key() {
        let mut item = movie();
        let before = item.presentation_unique_key().to_string();
        item.set_tags(vec!["Sci-Fi".into()]);
        assert_eq!(item.presentation_unique_key(), before);
        assert_eq!(item.on_metadata_changed(), ChangeMagnitude::Minor);
    }

    #[test]
    fn test_name_change_changes_key() {
        let mut item = movie();
        let before = item.presentation_unique_key().to_string();
        item.set_name("Aliens");
        assert_ne!(item.presentation_unique_key(), before);
        assert_eq!(item.on_metadata_changed(), ChangeMagnitude::Major);
    }

    #[test]
    fn test_name_case_and_padding_do_not_matter() {
        let mut a = movie();
        let mut b = movie();
        b.set_name("  ALIEN ");
        assert_eq!(a.presentation_unique_key(), b.presentation_unique_key());
    }

    #[test]
    fn test_same_name_different_paths_differ() {
        let a = movie();
        let mut b = movie();
        b.set_path(Some(PathBuf::from("/media/other/alien.mkv")));
        assert_ne!(derive_presentation_key(&a), derive_presentation_key(&b));
    }

    #[test]
    fn test_year_change_changes_movie_key_only() {
        let mut item = movie();
        let before = item.presentation_unique_key().to_string();
        item.set_production_year(Some(1986));
        assert_ne!(item.presentation_unique_key(), before);

        let mut episode = Item::new(
            ItemKind::Episode(EpisodeInfo {
                series_name: Some("Show".into()),
                season_number: Some(1),
                index_number: Some(1),
            }),
            "Pilot",
            Some(PathBuf::from("/tv/Show/s01e01.mkv")),
            SourceType::Library,
        );
        let before = episode.presentation_unique_key().to_string();
        episode.set_production_year(Some(2001));
        assert_eq!(episode.presentation_unique_key(), before);
    }

    #[test]
    fn test_remote_key_ignores_provider_insertion_order() {
        let a = Item::new(ItemKind::movie(), "Stream", None, SourceType::Remote)
            .with_provider_id("tmdb", "1")
            .with_provider_id("imdb", "tt1");
        let b = Item::new(ItemKind::movie(), "Stream", None, SourceType::Remote)
            .with_provider_id("imdb", "tt1")
            .with_provider_id("tmdb", "1");
        assert_eq!(derive_presentation_key(&a), derive_presentation_key(&b));
    }

    #[test]
    fn test_non_identity_lock_does_not_touch_key() {
        let mut item = movie();
        let before = item.presentation_unique_key().to_string();
        item.locked_fields.insert(MetadataField::Overview);
        item.overview = Some("In space".into());
        item.mark_changed(MetadataField::Overview);
        assert_eq!(item.presentation_unique_key(), before);
    }

    #[test]
    fn test_update_reason_mapping() {
        assert_eq!(ChangeMagnitude::None.update_reason(true), UpdateReason::None);
        assert_eq!(ChangeMagnitude::Minor.update_reason(true), UpdateReason::MetadataEdit);
        assert_eq!(ChangeMagnitude::Minor.update_reason(false), UpdateReason::MetadataImport);
        assert_eq!(ChangeMagnitude::Major.update_reason(true), UpdateReason::MetadataImport);
    }
}
