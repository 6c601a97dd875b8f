//! SQLite connection pool for the catalogue
//!
//! File databases run in WAL mode with a small pool; the in-memory variant
//! used by tests is pinned to one connection that never expires, since the
//! data lives and dies with that connection. Both enforce foreign keys so
//! cache entries follow their records, and both apply the embedded schema
//! on open.

use std::{path::Path, str::FromStr, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

/// Schema applied on every open; each statement is `IF NOT EXISTS`
const SCHEMA: &str = include_str!("migrations/20261019_initial.sql");

const FILE_POOL_SIZE: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the connection pool shared by every repository of one process
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the catalogue at `db_path`
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// `ConnectionFailed` when the file cannot be opened, `MigrationFailed`
    /// when the schema cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                CacheError::ConnectionFailed(format!("cannot create {}: {e}", dir.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(FILE_POOL_SIZE)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("cannot open {}: {e}", db_path.display()))
            })?;

        let opened = Self::with_schema(pool).await?;
        tracing::info!(path = %db_path.display(), "Catalogue opened");
        Ok(opened)
    }

    /// Opens a private in-memory catalogue
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("in-memory catalogue: {e}")))?;

        let opened = Self::with_schema(pool).await?;
        tracing::debug!("In-memory catalogue opened");
        Ok(opened)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every connection, waiting for in-flight queries to finish
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("Catalogue closed");
    }

    async fn with_schema(pool: SqlitePool) -> Result<Self, CacheError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(e.to_string()))?;
        Ok(Self { pool })
    }
}
