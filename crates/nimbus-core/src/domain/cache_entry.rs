//! Local cache entries
//!
//! A `LocalCacheEntry` records that the content of one item has been
//! materialized on local storage, and which revision it holds.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::ItemRecord;
use super::newtypes::{ItemId, VersionToken};

/// Materialized content for one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCacheEntry {
    item_id: ItemId,
    /// Version token of the record at the time the content was written
    version_token: Option<VersionToken>,
    /// Absolute path of the content file
    location: PathBuf,
    cached_at: DateTime<Utc>,
}

impl LocalCacheEntry {
    pub fn new(item_id: ItemId, version_token: Option<VersionToken>, location: PathBuf) -> Self {
        Self {
            item_id,
            version_token,
            location,
            cached_at: Utc::now(),
        }
    }

    /// Builds the entry describing the current content of `record`
    pub fn for_record(record: &ItemRecord, location: PathBuf) -> Self {
        Self::new(
            record.id().clone(),
            record.version_token().cloned(),
            location,
        )
    }

    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    pub fn version_token(&self) -> Option<&VersionToken> {
        self.version_token.as_ref()
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    /// Returns true if the content can be used without a re-fetch
    ///
    /// The entry must belong to the record and carry the record's current
    /// version token. A record without a token (never uploaded) can only be
    /// matched by an entry without one.
    pub fn is_valid_for(&self, record: &ItemRecord) -> bool {
        self.item_id == *record.id() && self.version_token.as_ref() == record.version_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::newtypes::RemotePath;

    fn record(token: &str) -> ItemRecord {
        ItemRecord::new_file(
            ItemId::new("R2".to_string()).unwrap(),
            "notes.txt",
            RemotePath::new("/files/alice".to_string()).unwrap(),
            10,
            Utc::now(),
        )
        .unwrap()
        .with_version_token(VersionToken::new(token.to_string()).unwrap())
    }

    #[test]
    fn test_valid_when_tokens_match() {
        let record = record("v1");
        let entry = LocalCacheEntry::for_record(&record, PathBuf::from("/s/R2/notes.txt"));
        assert!(entry.is_valid_for(&record));
    }

    #[test]
    fn test_stale_when_tokens_differ() {
        let entry = LocalCacheEntry::for_record(&record("v1"), PathBuf::from("/s/R2/notes.txt"));
        assert!(!entry.is_valid_for(&record("v2")));
    }
}
