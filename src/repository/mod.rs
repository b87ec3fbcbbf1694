//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM over SQLite, wrapped for async use.

pub mod context;
pub mod extracted;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod util;
pub mod work_items;

pub use context::DbContext;
pub use extracted::{ExportRow, ExtractedRepository, HarvestCounts, EXPORT_HEADER};
pub use pool::{DieselError, SqlitePool};
pub use util::{parse_datetime, parse_datetime_opt};
pub use work_items::{KnownItem, QueueCounts, WorkItemRepository};
