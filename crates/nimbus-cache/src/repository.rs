//! SQLite implementation of IStateRepository
//!
//! This module provides the concrete SQLite-based implementation of the
//! catalogue and cache tracker ports defined in nimbus-core. It handles all
//! domain type serialization/deserialization and SQL query construction.
//!
//! ## Type Mapping
//!
//! | Domain Type     | SQL Type | Strategy                                   |
//! |-----------------|----------|--------------------------------------------|
//! | ItemId          | TEXT     | String via `.as_str()` / `ItemId::new()`    |
//! | RemotePath      | TEXT     | String via `.as_str()` / `RemotePath::new()` |
//! | VersionToken    | TEXT     | String via `.as_str()` / `VersionToken::new()` |
//! | DateTime<Utc>   | TEXT     | ISO 8601 via `to_rfc3339()` / `DateTime::parse_from_rfc3339()` |
//! | ItemStatus      | TEXT     | snake_case name                            |
//! | ErrorInfo       | TEXT     | serde_json serialization                   |
//! | PathBuf         | TEXT     | lossy UTF-8 string                         |

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{Executor, Row, SqlitePool};

use nimbus_core::domain::{
    newtypes::{ItemId, RemotePath},
    Annotation, ItemRecord, ItemStatus, LocalCacheEntry,
};
use nimbus_core::ports::{IStateRepository, RecordFilter};

use crate::CacheError;

/// SQLite-based implementation of the state repository port
///
/// All operations are performed through a connection pool. Paired writes
/// (record + cache entry, identity promotion) run inside one transaction.
#[derive(Clone)]
pub struct SqliteStateRepository {
    pool: SqlitePool,
}

impl SqliteStateRepository {
    /// Creates a new repository instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Serialize an ItemStatus to a string for storage
fn status_to_string(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Normal => "normal",
        ItemStatus::InDownload => "in_download",
        ItemStatus::DownloadError => "download_error",
        ItemStatus::InUpload => "in_upload",
        ItemStatus::UploadError => "upload_error",
    }
}

/// Deserialize an ItemStatus from its stored string representation
fn status_from_string(s: &str) -> Result<ItemStatus, CacheError> {
    match s {
        "normal" => Ok(ItemStatus::Normal),
        "in_download" => Ok(ItemStatus::InDownload),
        "download_error" => Ok(ItemStatus::DownloadError),
        "in_upload" => Ok(ItemStatus::InUpload),
        "upload_error" => Ok(ItemStatus::UploadError),
        other => Err(CacheError::SerializationError(format!(
            "Unknown item status: {}",
            other
        ))),
    }
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite CURRENT_TIMESTAMP format
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn optional_string_value(s: Option<String>) -> serde_json::Value {
    match s {
        Some(v) => serde_json::Value::String(v),
        None => serde_json::Value::Null,
    }
}

// ============================================================================
// Row mapping functions
// ============================================================================

/// Reconstruct an ItemRecord from a database row
///
/// Uses serde JSON deserialization since the struct has private fields that
/// can only be set through constructors or deserialization. Field newtypes
/// validate themselves on the way in.
fn record_from_row(row: &SqliteRow) -> Result<ItemRecord, CacheError> {
    let id: String = row.get("id");
    let is_directory: bool = row.get("is_directory");
    let name: String = row.get("name");
    let container_path: String = row.get("container_path");
    let version_token: Option<String> = row.get("version_token");
    let size_bytes: i64 = row.get("size_bytes");
    let modified_at: String = row.get("modified_at");
    let status: String = row.get("status");
    let last_error: Option<String> = row.get("last_error");

    let status = status_from_string(&status)?;
    let modified_at = parse_datetime(&modified_at)?;

    let last_error_val: serde_json::Value = match last_error {
        Some(ref s) if !s.is_empty() => serde_json::from_str(s).map_err(|e| {
            CacheError::SerializationError(format!("Invalid last_error JSON: {}", e))
        })?,
        _ => serde_json::Value::Null,
    };

    let record_json = serde_json::json!({
        "id": id,
        "is_directory": is_directory,
        "name": name,
        "container_path": container_path,
        "version_token": optional_string_value(version_token),
        "size": size_bytes.max(0) as u64,
        "modified_at": modified_at.to_rfc3339(),
        "status": status,
        "last_error": last_error_val,
    });

    serde_json::from_value(record_json).map_err(|e| {
        CacheError::SerializationError(format!(
            "Failed to reconstruct ItemRecord '{}' from row: {}",
            id, e
        ))
    })
}

/// Reconstruct a LocalCacheEntry from a database row
fn entry_from_row(row: &SqliteRow) -> Result<LocalCacheEntry, CacheError> {
    let item_id: String = row.get("item_id");
    let version_token: Option<String> = row.get("version_token");
    let location: String = row.get("location");
    let cached_at: String = row.get("cached_at");

    let entry_json = serde_json::json!({
        "item_id": item_id,
        "version_token": optional_string_value(version_token),
        "location": PathBuf::from(location),
        "cached_at": parse_datetime(&cached_at)?.to_rfc3339(),
    });

    serde_json::from_value(entry_json).map_err(|e| {
        CacheError::SerializationError(format!(
            "Failed to reconstruct cache entry '{}' from row: {}",
            item_id, e
        ))
    })
}

/// Reconstruct an Annotation from a database row
fn annotation_from_row(row: &SqliteRow) -> Result<Annotation, CacheError> {
    let item_id: String = row.get("item_id");
    let favorite_rank: Option<i64> = row.get("favorite_rank");
    let tag_data: Option<Vec<u8>> = row.get("tag_data");

    let id = ItemId::new(item_id.clone()).map_err(|e| {
        CacheError::SerializationError(format!("Invalid ItemId '{}': {}", item_id, e))
    })?;

    let mut annotation = Annotation::new(id);
    if let Some(rank) = favorite_rank {
        annotation = annotation.with_favorite_rank(rank);
    }
    if let Some(data) = tag_data {
        annotation = annotation.with_tag_data(data);
    }
    Ok(annotation)
}

// ============================================================================
// Statements shared by pool and transaction paths
// ============================================================================

async fn write_record<'e, E>(executor: E, record: &ItemRecord) -> Result<(), CacheError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let last_error = match record.last_error() {
        Some(info) => Some(serde_json::to_string(info).map_err(|e| {
            CacheError::SerializationError(format!("Failed to serialize last_error: {}", e))
        })?),
        None => None,
    };

    sqlx::query(
        "INSERT INTO items \
         (id, is_directory, name, container_path, version_token, size_bytes, \
          modified_at, status, last_error) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET \
          is_directory = excluded.is_directory, \
          name = excluded.name, \
          container_path = excluded.container_path, \
          version_token = excluded.version_token, \
          size_bytes = excluded.size_bytes, \
          modified_at = excluded.modified_at, \
          status = excluded.status, \
          last_error = excluded.last_error",
    )
    .bind(record.id().as_str())
    .bind(record.is_directory())
    .bind(record.name())
    .bind(record.container_path().as_str())
    .bind(record.version_token().map(|t| t.as_str()))
    .bind(record.size() as i64)
    .bind(record.modified_at().to_rfc3339())
    .bind(status_to_string(record.status()))
    .bind(last_error)
    .execute(executor)
    .await?;

    Ok(())
}

async fn write_entry<'e, E>(executor: E, entry: &LocalCacheEntry) -> Result<(), CacheError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT OR REPLACE INTO local_files (item_id, version_token, location, cached_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(entry.item_id().as_str())
    .bind(entry.version_token().map(|t| t.as_str()))
    .bind(entry.location().to_string_lossy().into_owned())
    .bind(entry.cached_at().to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

// ============================================================================
// IStateRepository implementation
// ============================================================================

#[async_trait::async_trait]
impl IStateRepository for SqliteStateRepository {
    // --- Item records ---

    async fn get_record(&self, id: &ItemId) -> anyhow::Result<Option<ItemRecord>> {
        let row = sqlx::query("SELECT * FROM items WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(record_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn find_child(
        &self,
        container_path: &RemotePath,
        name: &str,
    ) -> anyhow::Result<Option<ItemRecord>> {
        let row = sqlx::query("SELECT * FROM items WHERE container_path = ? AND name = ? LIMIT 1")
            .bind(container_path.as_str())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(record_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn query_records(&self, filter: &RecordFilter) -> anyhow::Result<Vec<ItemRecord>> {
        let mut sql = String::from("SELECT * FROM items WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(ref container_path) = filter.container_path {
            sql.push_str(" AND container_path = ?");
            binds.push(container_path.as_str().to_string());
        }

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            binds.push(status_to_string(status).to_string());
        }

        if let Some(ref ids) = filter.ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; ids.len()].join(", ");
            sql.push_str(&format!(" AND id IN ({placeholders})"));
            binds.extend(ids.iter().map(|id| id.as_str().to_string()));
        }

        // Build the query dynamically
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(record_from_row(row)?);
        }

        Ok(records)
    }

    async fn upsert_record(&self, record: &ItemRecord) -> anyhow::Result<()> {
        write_record(&self.pool, record).await?;
        tracing::trace!(item_id = %record.id(), status = %record.status(), "Saved item record");
        Ok(())
    }

    async fn delete_record(&self, id: &ItemId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        tracing::trace!(item_id = %id, "Deleted item record");
        Ok(())
    }

    // --- Local cache entries ---

    async fn get_cache_entry(&self, id: &ItemId) -> anyhow::Result<Option<LocalCacheEntry>> {
        let row = sqlx::query("SELECT * FROM local_files WHERE item_id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(entry_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn upsert_cache_entry(&self, entry: &LocalCacheEntry) -> anyhow::Result<()> {
        write_entry(&self.pool, entry).await?;
        tracing::trace!(item_id = %entry.item_id(), "Saved cache entry");
        Ok(())
    }

    async fn delete_cache_entry(&self, id: &ItemId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM local_files WHERE item_id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        tracing::trace!(item_id = %id, "Deleted cache entry");
        Ok(())
    }

    async fn list_cache_entries(&self) -> anyhow::Result<Vec<LocalCacheEntry>> {
        let rows = sqlx::query("SELECT * FROM local_files ORDER BY cached_at ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(entry_from_row(row)?);
        }
        Ok(entries)
    }

    // --- Paired writes ---

    async fn save_record_with_entry(
        &self,
        record: &ItemRecord,
        entry: &LocalCacheEntry,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        write_record(&mut *tx, record).await?;
        write_entry(&mut *tx, entry).await?;
        tx.commit().await?;

        tracing::trace!(item_id = %record.id(), "Saved item record with cache entry");
        Ok(())
    }

    async fn promote_record(
        &self,
        old_id: &ItemId,
        record: &ItemRecord,
        entry: Option<&LocalCacheEntry>,
    ) -> anyhow::Result<()> {
        let new_id = record.id();
        let mut tx = self.pool.begin().await?;

        if old_id != new_id {
            sqlx::query("DELETE FROM items WHERE id = ?")
                .bind(old_id.as_str())
                .execute(&mut *tx)
                .await?;

            sqlx::query("UPDATE annotations SET item_id = ? WHERE item_id = ?")
                .bind(new_id.as_str())
                .bind(old_id.as_str())
                .execute(&mut *tx)
                .await?;
        }

        write_record(&mut *tx, record).await?;
        if let Some(entry) = entry {
            write_entry(&mut *tx, entry).await?;
        }
        tx.commit().await?;

        tracing::debug!(old_id = %old_id, new_id = %new_id, "Promoted item record");
        Ok(())
    }

    // --- Annotations ---

    async fn get_annotation(&self, id: &ItemId) -> anyhow::Result<Option<Annotation>> {
        let row = sqlx::query("SELECT * FROM annotations WHERE item_id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(annotation_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn list_favorites(&self) -> anyhow::Result<Vec<Annotation>> {
        let rows = sqlx::query(
            "SELECT * FROM annotations WHERE favorite_rank IS NOT NULL \
             ORDER BY favorite_rank ASC, item_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut annotations = Vec::with_capacity(rows.len());
        for row in &rows {
            annotations.push(annotation_from_row(row)?);
        }
        Ok(annotations)
    }

    async fn save_annotation(&self, annotation: &Annotation) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO annotations (item_id, favorite_rank, tag_data) \
             VALUES (?, ?, ?)",
        )
        .bind(annotation.item_id().as_str())
        .bind(annotation.favorite_rank())
        .bind(annotation.tag_data())
        .execute(&self.pool)
        .await?;

        tracing::trace!(item_id = %annotation.item_id(), "Saved annotation");
        Ok(())
    }
}
