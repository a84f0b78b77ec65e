//! Catalog item data model

pub mod fields;
pub mod image;
pub mod item;
pub mod kinds;

pub use fields::MetadataField;
pub use image::{ImageCandidate, ImageKind, ImageRecord, ImageSource};
pub use item::{Item, SourceType};
pub use kinds::{
    EpisodeInfo, FolderInfo, ItemKind, ItemPolicy, MovieInfo, MusicAlbumInfo, SeasonInfo,
    SeriesInfo,
};
