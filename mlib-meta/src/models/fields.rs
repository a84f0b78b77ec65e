//! Lockable metadata field tags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metadata field tag
///
/// A tag in an item's `locked_fields` set keeps refresh-sourced data from
/// overwriting the fields it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetadataField {
    /// Name and original title
    Name,
    Overview,
    Genres,
    Tags,
    Studios,
    ProductionYear,
    Runtime,
    /// Official rating label and numeric parental rating
    OfficialRating,
    /// Single-valued image kinds
    Images,
    /// Multi-valued image kinds
    Backdrops,
}

impl MetadataField {
    pub const ALL: [MetadataField; 10] = [
        MetadataField::Name,
        MetadataField::Overview,
        MetadataField::Genres,
        MetadataField::Tags,
        MetadataField::Studios,
        MetadataField::ProductionYear,
        MetadataField::Runtime,
        MetadataField::OfficialRating,
        MetadataField::Images,
        MetadataField::Backdrops,
    ];

    /// Whether a change to this field invalidates the presentation key
    pub fn is_identity(&self) -> bool {
        matches!(self, MetadataField::Name | MetadataField::ProductionYear)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataField::Name => "Name",
            MetadataField::Overview => "Overview",
            MetadataField::Genres => "Genres",
            MetadataField::Tags => "Tags",
            MetadataField::Studios => "Studios",
            MetadataField::ProductionYear => "ProductionYear",
            MetadataField::Runtime => "Runtime",
            MetadataField::OfficialRating => "OfficialRating",
            MetadataField::Images => "Images",
            MetadataField::Backdrops => "Backdrops",
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetadataField {
    type Err = String;

    /// Case-insensitive parse of the field name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetadataField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown metadata field: {}", s))
    }
}
