//! Presentation view of an item
//!
//! `ItemView` is what the host surface sees for one identifier. It is
//! derived on demand from the catalogue record, the cache entry and the
//! annotation side-table and never stored.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::annotation::Annotation;
use super::cache_entry::LocalCacheEntry;
use super::item::{ItemRecord, ItemStatus};
use super::newtypes::ItemIdentifier;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemView {
    pub identifier: ItemIdentifier,
    pub parent_identifier: ItemIdentifier,
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
    pub version_token: Option<String>,
    pub status: ItemStatus,
    pub is_downloaded: bool,
    pub is_downloading: bool,
    pub is_uploaded: bool,
    pub is_uploading: bool,
    pub download_error: Option<String>,
    pub upload_error: Option<String>,
    pub favorite_rank: Option<i64>,
    pub tag_data: Option<Vec<u8>>,
}

impl ItemView {
    pub fn build(
        record: &ItemRecord,
        parent_identifier: ItemIdentifier,
        entry: Option<&LocalCacheEntry>,
        annotation: Option<&Annotation>,
    ) -> Self {
        let status = record.status();
        let error_message = |wanted: ItemStatus| {
            (status == wanted)
                .then(|| record.last_error().map(|e| e.message().to_string()))
                .flatten()
        };

        Self {
            identifier: ItemIdentifier::from(record.id().clone()),
            parent_identifier,
            name: record.name().to_string(),
            is_directory: record.is_directory(),
            size: record.size(),
            modified_at: record.modified_at(),
            version_token: record.version_token().map(|t| t.as_str().to_string()),
            status,
            is_downloaded: entry.is_some_and(|e| e.is_valid_for(record)),
            is_downloading: status == ItemStatus::InDownload,
            is_uploaded: !status.has_pending_changes(),
            is_uploading: status == ItemStatus::InUpload,
            download_error: error_message(ItemStatus::DownloadError),
            upload_error: error_message(ItemStatus::UploadError),
            favorite_rank: annotation.and_then(Annotation::favorite_rank),
            tag_data: annotation.and_then(|a| a.tag_data().map(<[u8]>::to_vec)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::ErrorInfo;
    use crate::domain::newtypes::{ItemId, RemotePath, VersionToken};
    use crate::domain::transfer::TransferKind;
    use std::path::PathBuf;

    fn record() -> ItemRecord {
        ItemRecord::new_file(
            ItemId::new("R1".to_string()).unwrap(),
            "a.txt",
            RemotePath::new("/files/alice".to_string()).unwrap(),
            12,
            Utc::now(),
        )
        .unwrap()
        .with_version_token(VersionToken::new("v1".to_string()).unwrap())
    }

    #[test]
    fn test_downloaded_favorite() {
        let record = record();
        let entry = LocalCacheEntry::for_record(&record, PathBuf::from("/s/R1/a.txt"));
        let annotation = Annotation::new(record.id().clone()).with_favorite_rank(1);
        let view = ItemView::build(&record, ItemIdentifier::Root, Some(&entry), Some(&annotation));

        assert!(view.is_downloaded);
        assert!(view.is_uploaded);
        assert!(!view.is_downloading);
        assert_eq!(view.favorite_rank, Some(1));
        assert_eq!(view.version_token.as_deref(), Some("v1"));
        assert_eq!(view.identifier.to_string(), "R1");
    }

    #[test]
    fn test_download_error_message() {
        let mut record = record();
        record.begin_transfer(TransferKind::Download).unwrap();
        record
            .fail_transfer(
                TransferKind::Download,
                ErrorInfo::transfer_failed("Not found").with_status_code(404),
            )
            .unwrap();
        let view = ItemView::build(&record, ItemIdentifier::Root, None, None);
        assert_eq!(view.download_error.as_deref(), Some("Not found"));
        assert!(view.upload_error.is_none());
        assert!(!view.is_downloaded);
    }

    #[test]
    fn test_uploading_is_not_uploaded() {
        let record = ItemRecord::new_import(
            ItemId::temporary(),
            "b.txt",
            RemotePath::new("/files/alice".to_string()).unwrap(),
            3,
        )
        .unwrap();
        let view = ItemView::build(&record, ItemIdentifier::Root, None, None);
        assert!(view.is_uploading);
        assert!(!view.is_uploaded);
    }
}
