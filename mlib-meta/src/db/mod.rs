//! Database access

pub mod items;

pub use items::SqliteItemRepository;
