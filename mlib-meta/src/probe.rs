//! File probe collaborator
//!
//! Image validation asks a probe whether local files still exist. The probe
//! is injected so tests substitute a fake and the store never touches the
//! file system directly.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Probe failure; validation keeps the record and reports a warning
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probe unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait FileProbe: Send + Sync {
    /// Whether a local file exists
    async fn exists(&self, path: &Path) -> Result<bool, ProbeError>;
}

/// File probe backed by the real file system
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

#[async_trait]
impl FileProbe for FsProbe {
    async fn exists(&self, path: &Path) -> Result<bool, ProbeError> {
        Ok(tokio::fs::try_exists(path).await?)
    }
}
