//! Database context for managing connections and repository access.
//!
//! The DbContext is the primary entry point for all database operations.
//! It holds the connection pool and hands out repositories.

use std::path::Path;

use super::extracted::ExtractedRepository;
use super::pool::{DieselError, SqlitePool};
use super::work_items::WorkItemRepository;

/// Database context that manages the connection pool and provides repository access.
///
/// # Example
/// ```ignore
/// let ctx = DbContext::from_url("sqlite:data/listings.db");
/// ctx.migrate().await?;
/// let pending = ctx.work_items().pending(None, None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DbContext {
    pool: SqlitePool,
}

impl DbContext {
    /// Create a context from a database URL (`sqlite:` prefix optional).
    pub fn from_url(url: &str) -> Self {
        Self {
            pool: SqlitePool::new(url),
        }
    }

    /// Create a context from a database file path.
    pub fn from_path(path: &Path) -> Self {
        Self {
            pool: SqlitePool::from_path(path),
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the schema up to date.
    pub async fn migrate(&self) -> Result<(), DieselError> {
        super::migrations::run_migrations(self.pool.database_url()).await
    }

    pub fn work_items(&self) -> WorkItemRepository {
        WorkItemRepository::new(self.pool.clone())
    }

    pub fn extracted(&self) -> ExtractedRepository {
        ExtractedRepository::new(self.pool.clone())
    }
}
