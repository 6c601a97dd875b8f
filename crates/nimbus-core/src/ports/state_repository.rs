//! State repository port (driven/secondary port)
//!
//! This module defines the interface for the local metadata catalogue
//! (Item Records), the cache tracker (Local Cache Entries) and the
//! favorite/tag annotation side-table.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   and don't need domain-level classification.
//! - `RecordFilter` provides a composable query mechanism without exposing
//!   storage implementation details.
//! - Records and cache entries share the `ItemId` key. Writes that touch
//!   both go through the paired operations so they land atomically.

use crate::domain::{
    newtypes::{ItemId, RemotePath},
    Annotation, ItemRecord, ItemStatus, LocalCacheEntry,
};

// ============================================================================
// RecordFilter struct
// ============================================================================

/// Filter criteria for querying item records
///
/// All fields are optional; when `None`, no filtering is applied for that
/// field. Multiple filters are combined with AND logic.
///
/// # Example
///
/// ```
/// use nimbus_core::ports::RecordFilter;
/// use nimbus_core::domain::{ItemStatus, RemotePath};
///
/// // Every record stuck in an upload under the account home
/// let filter = RecordFilter::new()
///     .with_container_path(RemotePath::new("/files/alice".to_string()).unwrap())
///     .with_status(ItemStatus::InUpload);
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Filter by parent container path (direct children only)
    pub container_path: Option<RemotePath>,
    /// Filter by status
    pub status: Option<ItemStatus>,
    /// Filter by a set of identifiers
    pub ids: Option<Vec<ItemId>>,
}

impl RecordFilter {
    /// Creates a new empty filter (matches all records)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container_path(mut self, container_path: RemotePath) -> Self {
        self.container_path = Some(container_path);
        self
    }

    pub fn with_status(mut self, status: ItemStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_ids(mut self, ids: Vec<ItemId>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Returns true if no filters are set
    pub fn is_empty(&self) -> bool {
        self.container_path.is_none() && self.status.is_none() && self.ids.is_none()
    }

    /// Returns true if `record` satisfies every set criterion
    pub fn matches(&self, record: &ItemRecord) -> bool {
        self.container_path
            .as_ref()
            .map_or(true, |c| record.container_path() == c)
            && self.status.map_or(true, |s| record.status() == s)
            && self
                .ids
                .as_ref()
                .map_or(true, |ids| ids.contains(record.id()))
    }
}

// ============================================================================
// IStateRepository trait
// ============================================================================

/// Port trait for the catalogue and cache tracker
///
/// ## Implementation Notes
///
/// - Implementations must make `save_record_with_entry` and
///   `promote_record` atomic.
/// - Deleting a record also deletes its cache entry.
/// - `query_records` returns records in no particular order.
#[async_trait::async_trait]
pub trait IStateRepository: Send + Sync {
    // --- Item records ---

    /// Retrieves a record by its identifier
    async fn get_record(&self, id: &ItemId) -> anyhow::Result<Option<ItemRecord>>;

    /// Retrieves the record whose remote path is `container_path/name`
    async fn find_child(
        &self,
        container_path: &RemotePath,
        name: &str,
    ) -> anyhow::Result<Option<ItemRecord>>;

    /// Queries records matching the given filter criteria
    async fn query_records(&self, filter: &RecordFilter) -> anyhow::Result<Vec<ItemRecord>>;

    /// Saves a record (insert or update)
    async fn upsert_record(&self, record: &ItemRecord) -> anyhow::Result<()>;

    /// Deletes a record and its cache entry
    async fn delete_record(&self, id: &ItemId) -> anyhow::Result<()>;

    // --- Local cache entries ---

    async fn get_cache_entry(&self, id: &ItemId) -> anyhow::Result<Option<LocalCacheEntry>>;

    async fn upsert_cache_entry(&self, entry: &LocalCacheEntry) -> anyhow::Result<()>;

    async fn delete_cache_entry(&self, id: &ItemId) -> anyhow::Result<()>;

    /// Lists every cache entry
    async fn list_cache_entries(&self) -> anyhow::Result<Vec<LocalCacheEntry>>;

    // --- Paired writes ---

    /// Saves a record and its cache entry in one transaction
    async fn save_record_with_entry(
        &self,
        record: &ItemRecord,
        entry: &LocalCacheEntry,
    ) -> anyhow::Result<()>;

    /// Replaces the record stored under `old_id` with `record` (which carries
    /// the new identifier) and writes its cache entry, in one transaction
    ///
    /// Annotations keyed by `old_id` move to the new identifier.
    async fn promote_record(
        &self,
        old_id: &ItemId,
        record: &ItemRecord,
        entry: Option<&LocalCacheEntry>,
    ) -> anyhow::Result<()>;

    // --- Annotations ---

    async fn get_annotation(&self, id: &ItemId) -> anyhow::Result<Option<Annotation>>;

    /// Lists annotations with a favorite rank, ordered by rank
    async fn list_favorites(&self) -> anyhow::Result<Vec<Annotation>>;

    async fn save_annotation(&self, annotation: &Annotation) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str, container: &str) -> ItemRecord {
        ItemRecord::new_file(
            ItemId::new(id.to_string()).unwrap(),
            "a.txt",
            RemotePath::new(container.to_string()).unwrap(),
            1,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = RecordFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&record("R1", "/a")));
    }

    #[test]
    fn test_combined_filter() {
        let filter = RecordFilter::new()
            .with_container_path(RemotePath::new("/a".to_string()).unwrap())
            .with_status(ItemStatus::Normal);
        assert!(filter.matches(&record("R1", "/a")));
        assert!(!filter.matches(&record("R1", "/b")));

        let by_id = RecordFilter::new().with_ids(vec![ItemId::new("R2".to_string()).unwrap()]);
        assert!(!by_id.matches(&record("R1", "/a")));
    }
}
