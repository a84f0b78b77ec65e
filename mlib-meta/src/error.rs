//! Error types for mlib-meta

use thiserror::Error;
use uuid::Uuid;

use crate::models::ImageKind;

/// Result type for metadata core operations
pub type Result<T> = std::result::Result<T, MetaError>;

/// Metadata core error
#[derive(Debug, Error)]
pub enum MetaError {
    /// Slot outside `0..=count`, or non-zero slot of a single-valued kind
    #[error("Invalid {kind} slot {index} (count {count})")]
    InvalidSlot {
        kind: ImageKind,
        index: usize,
        count: usize,
    },

    /// Refresh-sourced image refused by a field lock
    #[error("Image kind locked: {0}")]
    ImageKindLocked(ImageKind),

    #[error("Item not found: {0}")]
    ItemNotFound(Uuid),

    /// File probe could not answer; the record is kept
    #[error("Probe unavailable for {path}: {message}")]
    ProbeUnavailable { path: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    /// Metadata provider fetch failed
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Common error: {0}")]
    Common(#[from] mlib_common::Error),
}

impl MetaError {
    /// Whether the error is a cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MetaError::Cancelled)
    }
}
