//! # MLIB Common Library
//!
//! Shared code for the MLIB catalog crates:
//! - Error type
//! - TOML configuration and root folder resolution
//! - Catalog event types and EventBus
//! - Database initialization
//! - Tick/time utilities

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
