//! Image kinds, sources and records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::fields::MetadataField;

/// Image category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ImageKind {
    Primary,
    Art,
    Backdrop,
    Banner,
    Logo,
    Thumb,
    Disc,
    Box,
    Screenshot,
    Menu,
    Chapter,
    BoxRear,
}

impl ImageKind {
    pub const ALL: [ImageKind; 12] = [
        ImageKind::Primary,
        ImageKind::Art,
        ImageKind::Backdrop,
        ImageKind::Banner,
        ImageKind::Logo,
        ImageKind::Thumb,
        ImageKind::Disc,
        ImageKind::Box,
        ImageKind::Screenshot,
        ImageKind::Menu,
        ImageKind::Chapter,
        ImageKind::BoxRear,
    ];

    /// Multi-valued kinds hold any number of slots; all others hold slot 0 only
    pub fn allows_multiple(&self) -> bool {
        matches!(
            self,
            ImageKind::Backdrop | ImageKind::Screenshot | ImageKind::Chapter
        )
    }

    /// Lock tag guarding refresh-sourced images of this kind
    pub fn lock_field(&self) -> MetadataField {
        if self.allows_multiple() {
            MetadataField::Backdrops
        } else {
            MetadataField::Images
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Primary => "Primary",
            ImageKind::Art => "Art",
            ImageKind::Backdrop => "Backdrop",
            ImageKind::Banner => "Banner",
            ImageKind::Logo => "Logo",
            ImageKind::Thumb => "Thumb",
            ImageKind::Disc => "Disc",
            ImageKind::Box => "Box",
            ImageKind::Screenshot => "Screenshot",
            ImageKind::Menu => "Menu",
            ImageKind::Chapter => "Chapter",
            ImageKind::BoxRear => "BoxRear",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown image kind: {}", s))
    }
}

/// Where an image lives
///
/// Local files and remote URLs are distinct variants; only local files are
/// ever probed or removed by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "location")]
pub enum ImageSource {
    Local(PathBuf),
    Remote(String),
}

impl ImageSource {
    /// Classify an untyped string: `http`-prefixed (any case) is remote
    pub fn classify(value: &str) -> Self {
        let is_remote = value
            .get(..4)
            .map(|prefix| prefix.eq_ignore_ascii_case("http"))
            .unwrap_or(false);

        if is_remote {
            ImageSource::Remote(value.to_string())
        } else {
            ImageSource::Local(PathBuf::from(value))
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ImageSource::Local(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ImageSource::Remote(_))
    }

    pub fn local_path(&self) -> Option<&Path> {
        match self {
            ImageSource::Local(path) => Some(path),
            ImageSource::Remote(_) => None,
        }
    }

    /// Path or URL as a string
    pub fn to_path_string(&self) -> String {
        match self {
            ImageSource::Local(path) => path.to_string_lossy().into_owned(),
            ImageSource::Remote(url) => url.clone(),
        }
    }

    /// Same variant and same location, ignoring ASCII case
    pub fn matches(&self, other: &ImageSource) -> bool {
        match (self, other) {
            (ImageSource::Local(a), ImageSource::Local(b)) => a
                .to_string_lossy()
                .eq_ignore_ascii_case(&b.to_string_lossy()),
            (ImageSource::Remote(a), ImageSource::Remote(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path_string())
    }
}

/// One image attached to an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub kind: ImageKind,
    /// Position within the kind, dense from 0
    pub slot_index: usize,
    pub source: ImageSource,
    /// Last write time of a local file
    #[serde(default)]
    pub date_modified: Option<DateTime<Utc>>,
    /// Pixel width (0 = unknown)
    #[serde(default)]
    pub width: u32,
    /// Pixel height (0 = unknown)
    #[serde(default)]
    pub height: u32,
}

impl ImageRecord {
    pub fn new(kind: ImageKind, slot_index: usize, source: ImageSource) -> Self {
        Self {
            kind,
            slot_index,
            source,
            date_modified: None,
            width: 0,
            height: 0,
        }
    }

    pub(crate) fn from_candidate(kind: ImageKind, slot_index: usize, candidate: &ImageCandidate) -> Self {
        Self {
            kind,
            slot_index,
            source: candidate.source.clone(),
            date_modified: candidate.date_modified,
            width: candidate.width,
            height: candidate.height,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.kind == ImageKind::Primary && self.slot_index == 0
    }

    pub fn is_local(&self) -> bool {
        self.source.is_local()
    }

    pub fn path(&self) -> String {
        self.source.to_path_string()
    }

    /// Width / height, if both dimensions are known
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width > 0 && self.height > 0 {
            Some(self.width as f64 / self.height as f64)
        } else {
            None
        }
    }
}

/// Image offered to the store by a caller or a metadata provider
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCandidate {
    pub source: ImageSource,
    pub date_modified: Option<DateTime<Utc>>,
    pub width: u32,
    pub height: u32,
}

impl ImageCandidate {
    pub fn new(source: ImageSource) -> Self {
        Self {
            source,
            date_modified: None,
            width: 0,
            height: 0,
        }
    }

    pub fn local(path: impl Into<PathBuf>, date_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            date_modified,
            ..Self::new(ImageSource::Local(path.into()))
        }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Self::new(ImageSource::Remote(url.into()))
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_valued_kinds() {
        let multi: Vec<_> = ImageKind::ALL
            .iter()
            .filter(|k| k.allows_multiple())
            .copied()
            .collect();
        assert_eq!(
            multi,
            vec![ImageKind::Backdrop, ImageKind::Screenshot, ImageKind::Chapter]
        );
        assert_eq!(ImageKind::Backdrop.lock_field(), MetadataField::Backdrops);
        assert_eq!(ImageKind::Logo.lock_field(), MetadataField::Images);
    }

    #[test]
    fn test_classify_http_prefix_any_case() {
        assert!(ImageSource::classify("https://img.example/a.jpg").is_remote());
        assert!(ImageSource::classify("HTTP://img.example/a.jpg").is_remote());
        assert!(ImageSource::classify("/media/movies/poster.jpg").is_local());
        assert!(ImageSource::classify("ht").is_local());
        assert!(ImageSource::classify("").is_local());
    }

    #[test]
    fn test_matches_ignores_ascii_case_but_not_variant() {
        let a = ImageSource::Local(PathBuf::from("/Media/Poster.JPG"));
        let b = ImageSource::Local(PathBuf::from("/media/poster.jpg"));
        let c = ImageSource::Remote("/media/poster.jpg".to_string());
        assert!(a.matches(&b));
        assert!(!b.matches(&c));
    }

    #[test]
    fn test_is_primary_requires_slot_zero() {
        let src = ImageSource::classify("/m/folder.jpg");
        assert!(ImageRecord::new(ImageKind::Primary, 0, src.clone()).is_primary());
        assert!(!ImageRecord::new(ImageKind::Backdrop, 0, src).is_primary());
    }

    #[test]
    fn test_aspect_ratio_unknown_dimensions() {
        let mut record = ImageRecord::new(ImageKind::Primary, 0, ImageSource::classify("/p.jpg"));
        assert_eq!(record.aspect_ratio(), None);
        record.width = 1000;
        record.height = 1500;
        let ratio = record.aspect_ratio().unwrap();
        assert!((ratio - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("boxrear".parse::<ImageKind>().unwrap(), ImageKind::BoxRear);
        assert!("poster".parse::<ImageKind>().is_err());
    }
}
