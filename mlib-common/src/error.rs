//! Error type shared by the MLIB crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures in configuration loading and catalog database setup
#[derive(Error, Debug)]
pub enum Error {
    #[error("Catalog database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Reading or writing the config file, or creating the root folder
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file missing from every lookup location, or not valid TOML
    #[error("Configuration error: {0}")]
    Config(String),
}
