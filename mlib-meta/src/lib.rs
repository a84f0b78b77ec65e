//! mlib-meta library interface
//!
//! Metadata refresh and image management for catalog items:
//! - Refresh gate and locked-field merge
//! - Image slot store with file validation
//! - Presentation key derivation
//! - Inherited parental rating and tags
//! - Per-item serialized service over a pluggable repository

pub mod cache;
pub mod db;
pub mod error;
pub mod identity;
pub mod images;
pub mod inherited;
pub mod merge;
pub mod models;
pub mod persistence;
pub mod probe;
pub mod refresh;
pub mod service;

pub use crate::error::{MetaError, Result};
pub use crate::images::{ImageSlotStore, ValidationReport};
pub use crate::merge::{Candidate, FieldMerger, MergeOutcome, MetadataUpdate};
pub use crate::models::{ImageCandidate, ImageKind, ImageRecord, ImageSource, Item, ItemKind, MetadataField, SourceType};
pub use crate::refresh::{RefreshContext, RefreshDecision, RefreshGate, RefreshTrigger};
pub use crate::service::{MetadataService, RefreshOutcome};
