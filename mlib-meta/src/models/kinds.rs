//! Item variants and their refresh policies
//!
//! Every catalog item shares the [`Item`](super::Item) data model; what
//! differs per variant (movie, series, episode, ...) is policy. Each variant
//! type implements [`ItemPolicy`] and [`ItemKind`] dispatches to it.

use serde::{Deserialize, Serialize};

/// Variant-specific behavior consulted by the refresh gate, identity key
/// deriver and local-metadata resolution
pub trait ItemPolicy: Send + Sync {
    /// Stable tag mixed into the presentation key
    fn kind_name(&self) -> &'static str;

    /// Whether a changed `date_modified` may trigger a refresh
    fn enable_refresh_on_date_modified_change(&self) -> bool {
        true
    }

    /// Whether existing local metadata suppresses non-explicit refreshes
    fn stop_refresh_if_local_metadata_found(&self) -> bool {
        true
    }

    fn supports_local_metadata(&self) -> bool {
        true
    }

    fn supports_people(&self) -> bool {
        true
    }

    fn supports_remote_image_downloading(&self) -> bool {
        true
    }

    fn always_scan_internal_metadata_path(&self) -> bool {
        false
    }

    /// Container items (series, seasons, albums, folders) own their path
    fn is_folder(&self) -> bool {
        false
    }

    /// Whether the production year takes part in the presentation key
    fn uses_production_year(&self) -> bool {
        true
    }

    /// Whether a library item of this kind is incomplete without provider ids
    fn expects_provider_ids(&self) -> bool {
        true
    }

    /// Variant-specific reason to force a refresh
    fn requires_refresh(&self) -> bool {
        false
    }

    /// Additional disambiguating parts for the presentation key
    fn identity_parts(&self) -> Vec<String> {
        Vec::new()
    }

    /// Fixed local metadata file name inside the containing folder;
    /// `None` means `<file stem>.nfo` next to the media file
    fn local_metadata_file_name(&self) -> Option<&'static str> {
        None
    }

    fn default_primary_image_aspect_ratio(&self) -> Option<f64> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieInfo {}

impl ItemPolicy for MovieInfo {
    fn kind_name(&self) -> &'static str {
        "movie"
    }

    fn local_metadata_file_name(&self) -> Option<&'static str> {
        Some("movie.nfo")
    }

    fn default_primary_image_aspect_ratio(&self) -> Option<f64> {
        Some(2.0 / 3.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesInfo {}

impl ItemPolicy for SeriesInfo {
    fn kind_name(&self) -> &'static str {
        "series"
    }

    // Folder mtimes change whenever an episode lands
    fn enable_refresh_on_date_modified_change(&self) -> bool {
        false
    }

    fn is_folder(&self) -> bool {
        true
    }

    fn local_metadata_file_name(&self) -> Option<&'static str> {
        Some("tvshow.nfo")
    }

    fn default_primary_image_aspect_ratio(&self) -> Option<f64> {
        Some(2.0 / 3.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonInfo {
    pub series_name: Option<String>,
    pub index_number: Option<i32>,
}

impl ItemPolicy for SeasonInfo {
    fn kind_name(&self) -> &'static str {
        "season"
    }

    fn enable_refresh_on_date_modified_change(&self) -> bool {
        false
    }

    fn stop_refresh_if_local_metadata_found(&self) -> bool {
        false
    }

    fn is_folder(&self) -> bool {
        true
    }

    fn uses_production_year(&self) -> bool {
        false
    }

    fn expects_provider_ids(&self) -> bool {
        false
    }

    fn requires_refresh(&self) -> bool {
        self.index_number.is_none()
    }

    fn identity_parts(&self) -> Vec<String> {
        vec![
            normalize_part(self.series_name.as_deref()),
            number_part(self.index_number),
        ]
    }

    fn local_metadata_file_name(&self) -> Option<&'static str> {
        Some("season.nfo")
    }

    fn default_primary_image_aspect_ratio(&self) -> Option<f64> {
        Some(2.0 / 3.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub series_name: Option<String>,
    pub season_number: Option<i32>,
    pub index_number: Option<i32>,
}

impl ItemPolicy for EpisodeInfo {
    fn kind_name(&self) -> &'static str {
        "episode"
    }

    fn uses_production_year(&self) -> bool {
        false
    }

    fn requires_refresh(&self) -> bool {
        self.index_number.is_none()
    }

    fn identity_parts(&self) -> Vec<String> {
        vec![
            normalize_part(self.series_name.as_deref()),
            number_part(self.season_number),
            number_part(self.index_number),
        ]
    }

    fn default_primary_image_aspect_ratio(&self) -> Option<f64> {
        Some(16.0 / 9.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MusicAlbumInfo {
    pub album_artists: Vec<String>,
}

impl ItemPolicy for MusicAlbumInfo {
    fn kind_name(&self) -> &'static str {
        "musicalbum"
    }

    fn supports_people(&self) -> bool {
        false
    }

    fn is_folder(&self) -> bool {
        true
    }

    fn identity_parts(&self) -> Vec<String> {
        let mut artists: Vec<String> = self
            .album_artists
            .iter()
            .map(|a| normalize_part(Some(a)))
            .collect();
        artists.sort();
        artists
    }

    fn local_metadata_file_name(&self) -> Option<&'static str> {
        Some("album.nfo")
    }

    fn default_primary_image_aspect_ratio(&self) -> Option<f64> {
        Some(1.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FolderInfo {
    pub collection_type: Option<String>,
}

impl ItemPolicy for FolderInfo {
    fn kind_name(&self) -> &'static str {
        "folder"
    }

    fn enable_refresh_on_date_modified_change(&self) -> bool {
        false
    }

    fn stop_refresh_if_local_metadata_found(&self) -> bool {
        false
    }

    fn supports_local_metadata(&self) -> bool {
        false
    }

    fn supports_people(&self) -> bool {
        false
    }

    fn supports_remote_image_downloading(&self) -> bool {
        false
    }

    fn always_scan_internal_metadata_path(&self) -> bool {
        true
    }

    fn is_folder(&self) -> bool {
        true
    }

    fn uses_production_year(&self) -> bool {
        false
    }

    fn expects_provider_ids(&self) -> bool {
        false
    }
}

/// Item variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "info")]
pub enum ItemKind {
    Movie(MovieInfo),
    Series(SeriesInfo),
    Season(SeasonInfo),
    Episode(EpisodeInfo),
    MusicAlbum(MusicAlbumInfo),
    Folder(FolderInfo),
}

impl ItemKind {
    pub fn policy(&self) -> &dyn ItemPolicy {
        match self {
            ItemKind::Movie(info) => info,
            ItemKind::Series(info) => info,
            ItemKind::Season(info) => info,
            ItemKind::Episode(info) => info,
            ItemKind::MusicAlbum(info) => info,
            ItemKind::Folder(info) => info,
        }
    }

    pub fn movie() -> Self {
        ItemKind::Movie(MovieInfo::default())
    }

    pub fn series() -> Self {
        ItemKind::Series(SeriesInfo::default())
    }

    pub fn folder() -> Self {
        ItemKind::Folder(FolderInfo::default())
    }
}

fn normalize_part(value: Option<&str>) -> String {
    value.map(|v| v.trim().to_lowercase()).unwrap_or_default()
}

fn number_part(value: Option<i32>) -> String {
    value.map(|n| n.to_string()).unwrap_or_default()
}
