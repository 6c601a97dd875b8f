//! Nimbus Cache - SQLite catalogue
//!
//! Persists everything the engine knows about the remote account:
//! - `items`: one row per catalogued file or directory
//! - `local_files`: which items have content in local storage, and at
//!   which version
//! - `annotations`: favorite rank and tag data written by other features
//!
//! [`SqliteStateRepository`] implements the `IStateRepository` port of
//! `nimbus-core` on top of a [`DatabasePool`].
//!
//! ```no_run
//! use std::path::Path;
//! use nimbus_cache::{DatabasePool, SqliteStateRepository};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/nimbus/catalogue.db")).await?;
//! let repo = SqliteStateRepository::new(pool.pool().clone());
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteStateRepository;

/// Failures of the catalogue adapter
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cannot open catalogue: {0}")]
    ConnectionFailed(String),

    #[error("catalogue query failed: {0}")]
    QueryFailed(String),

    #[error("cannot apply catalogue schema: {0}")]
    MigrationFailed(String),

    /// A stored value no longer decodes into its domain type
    #[error("corrupt catalogue row: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
