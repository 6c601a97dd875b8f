//! ItemRecord domain entity
//!
//! This module defines the ItemRecord entity which describes one remote file
//! or directory as known to the local catalogue, together with the per-item
//! transfer lifecycle.
//!
//! ## State Machine
//!
//! ```text
//!                 materialize                 success
//!     ┌────────┐ ────────────► ┌────────────┐ ────────┐
//!     │ Normal │               │ InDownload │         │
//!     │        │ ◄──────────── └────────────┘         │
//!     └────────┘   success/cancel     │ failure       │
//!       │   ▲                         ▼               │
//!       │   │                  ┌───────────────┐      │
//!       │   └───── reset ───── │ DownloadError │ ─────┘ retry
//!       │                      └───────────────┘
//!       │ upload / import
//!       ▼
//!     ┌──────────┐  failure/cancel  ┌─────────────┐
//!     │ InUpload │ ───────────────► │ UploadError │
//!     └──────────┘ ◄─────────────── └─────────────┘
//!          │          retry
//!          └──── success ────► Normal
//! ```
//!
//! No state is terminal. A download and an upload can never be active on
//! the same item at once: `InDownload` and `InUpload` do not reach each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::DomainError;
use super::newtypes::{ItemId, RemotePath, VersionToken};
use super::transfer::TransferKind;

// ============================================================================
// ItemStatus enum
// ============================================================================

/// Transfer lifecycle status of an item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Content and metadata consistent, no pending I/O
    #[default]
    Normal,
    /// Content is being fetched from the server
    InDownload,
    /// Last download failed
    DownloadError,
    /// Local content is being sent to the server
    InUpload,
    /// Last upload failed; local content is retained
    UploadError,
}

impl ItemStatus {
    /// Returns true while a transfer is registered for the item
    pub fn is_transferring(&self) -> bool {
        matches!(self, ItemStatus::InDownload | ItemStatus::InUpload)
    }

    /// Returns true if the last transfer failed
    pub fn is_error(&self) -> bool {
        matches!(self, ItemStatus::DownloadError | ItemStatus::UploadError)
    }

    /// Returns true if local content has not reached the server yet
    pub fn has_pending_changes(&self) -> bool {
        matches!(self, ItemStatus::InUpload | ItemStatus::UploadError)
    }

    /// The transfer kind this status belongs to, if any
    pub fn transfer_kind(&self) -> Option<TransferKind> {
        match self {
            ItemStatus::InDownload | ItemStatus::DownloadError => Some(TransferKind::Download),
            ItemStatus::InUpload | ItemStatus::UploadError => Some(TransferKind::Upload),
            ItemStatus::Normal => None,
        }
    }

    /// The in-flight status for a transfer kind
    pub fn in_flight(kind: TransferKind) -> Self {
        match kind {
            TransferKind::Download => ItemStatus::InDownload,
            TransferKind::Upload => ItemStatus::InUpload,
        }
    }

    /// The failure status for a transfer kind
    pub fn failed(kind: TransferKind) -> Self {
        match kind {
            TransferKind::Download => ItemStatus::DownloadError,
            TransferKind::Upload => ItemStatus::UploadError,
        }
    }

    /// Checks if a status transition is valid
    ///
    /// Valid transitions:
    /// - Normal -> InDownload, InUpload
    /// - InDownload -> Normal, DownloadError
    /// - InUpload -> Normal, UploadError
    /// - DownloadError -> Normal, InDownload
    /// - UploadError -> Normal, InUpload
    pub fn can_transition_to(&self, target: ItemStatus) -> bool {
        matches!(
            (self, target),
            (ItemStatus::Normal, ItemStatus::InDownload)
                | (ItemStatus::Normal, ItemStatus::InUpload)
                | (ItemStatus::InDownload, ItemStatus::Normal)
                | (ItemStatus::InDownload, ItemStatus::DownloadError)
                | (ItemStatus::InUpload, ItemStatus::Normal)
                | (ItemStatus::InUpload, ItemStatus::UploadError)
                | (ItemStatus::DownloadError, ItemStatus::Normal)
                | (ItemStatus::DownloadError, ItemStatus::InDownload)
                | (ItemStatus::UploadError, ItemStatus::Normal)
                | (ItemStatus::UploadError, ItemStatus::InUpload)
        )
    }

    /// Returns the status name
    pub fn name(&self) -> &'static str {
        match self {
            ItemStatus::Normal => "Normal",
            ItemStatus::InDownload => "InDownload",
            ItemStatus::DownloadError => "DownloadError",
            ItemStatus::InUpload => "InUpload",
            ItemStatus::UploadError => "UploadError",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Normal => write!(f, "normal"),
            ItemStatus::InDownload => write!(f, "in_download"),
            ItemStatus::DownloadError => write!(f, "download_error"),
            ItemStatus::InUpload => write!(f, "in_upload"),
            ItemStatus::UploadError => write!(f, "upload_error"),
        }
    }
}

// ============================================================================
// ErrorInfo struct
// ============================================================================

/// Error code for network or server failures during a transfer
pub const CODE_TRANSFER_FAILED: &str = "TRANSFER_FAILED";
/// Error code for connectivity failures
pub const CODE_SERVER_UNREACHABLE: &str = "SERVER_UNREACHABLE";
/// Error code for version token mismatches reported by the server
pub const CODE_CONFLICT: &str = "CONFLICT";
/// Error code for transfers cancelled by the user or by eviction
pub const CODE_CANCELLED: &str = "CANCELLED";
/// Error code for transfers cut short by a process restart
pub const CODE_INTERRUPTED: &str = "INTERRUPTED";

/// Information about the last failed transfer of an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code for categorization (e.g., "TRANSFER_FAILED")
    code: String,
    /// Human-readable error message
    message: String,
    /// HTTP status code when the server answered
    status_code: Option<u16>,
    /// Number of retries attempted since the error was first recorded
    retry_count: u32,
    /// When the error was recorded
    occurred_at: DateTime<Utc>,
}

impl ErrorInfo {
    /// Creates a new ErrorInfo
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status_code: None,
            retry_count: 0,
            occurred_at: Utc::now(),
        }
    }

    /// Attaches the HTTP status code returned by the server
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// Increments the retry count
    pub fn record_retry(&mut self) {
        self.retry_count += 1;
    }

    /// Network or server failure
    pub fn transfer_failed(message: impl Into<String>) -> Self {
        Self::new(CODE_TRANSFER_FAILED, message)
    }

    /// Connectivity failure
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(CODE_SERVER_UNREACHABLE, message)
    }

    /// Version token mismatch detected by the server
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(CODE_CONFLICT, message)
    }

    /// Transfer cancelled before completion
    pub fn cancelled() -> Self {
        Self::new(CODE_CANCELLED, "Transfer was cancelled")
    }

    /// Transfer lost to a process restart
    pub fn interrupted() -> Self {
        Self::new(CODE_INTERRUPTED, "Transfer was interrupted")
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(status) = self.status_code {
            write!(f, " (HTTP {})", status)?;
        }
        if self.retry_count > 0 {
            write!(f, " (retries: {})", self.retry_count)?;
        }
        Ok(())
    }
}

// ============================================================================
// ItemRecord struct
// ============================================================================

/// Catalogue entry describing one remote file or directory
///
/// Every field is present once the record is constructed; constructors are
/// the single validation point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Stable identifier (server-assigned or temporary)
    id: ItemId,
    /// Whether this item is a directory
    is_directory: bool,
    /// Display name, a single path component
    name: String,
    /// Remote path of the parent container
    container_path: RemotePath,
    /// Current content revision; `None` until the server has assigned one
    version_token: Option<VersionToken>,
    /// Size in bytes (0 for directories)
    size: u64,
    /// Last modification time reported by the server
    modified_at: DateTime<Utc>,
    /// Transfer lifecycle status
    status: ItemStatus,
    /// Details of the last failed transfer
    last_error: Option<ErrorInfo>,
}

/// Validates a display name
fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(DomainError::InvalidRecord(format!(
            "Invalid item name: {name:?}"
        )));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(DomainError::InvalidRecord(format!(
            "Item name must be a single path component: {name:?}"
        )));
    }
    Ok(())
}

impl ItemRecord {
    fn build(
        id: ItemId,
        is_directory: bool,
        name: impl Into<String>,
        container_path: RemotePath,
        size: u64,
        modified_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        validate_name(&name)?;
        if id.is_root() {
            return Err(DomainError::InvalidRecord(
                "The root identifier cannot be catalogued".to_string(),
            ));
        }

        Ok(Self {
            id,
            is_directory,
            name,
            container_path,
            version_token: None,
            size,
            modified_at,
            status: ItemStatus::Normal,
            last_error: None,
        })
    }

    /// Creates a record for a remote file
    pub fn new_file(
        id: ItemId,
        name: impl Into<String>,
        container_path: RemotePath,
        size: u64,
        modified_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        Self::build(id, false, name, container_path, size, modified_at)
    }

    /// Creates a record for a remote directory
    pub fn new_directory(
        id: ItemId,
        name: impl Into<String>,
        container_path: RemotePath,
        modified_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        Self::build(id, true, name, container_path, 0, modified_at)
    }

    /// Creates the record of a freshly imported local file awaiting its
    /// first upload
    pub fn new_import(
        id: ItemId,
        name: impl Into<String>,
        container_path: RemotePath,
        size: u64,
    ) -> Result<Self, DomainError> {
        let mut record = Self::build(id, false, name, container_path, size, Utc::now())?;
        record.status = ItemStatus::InUpload;
        Ok(record)
    }

    /// The synthetic directory standing for the account's root container
    ///
    /// It is never stored in the catalogue; its container path is the
    /// account home path and its parent is itself.
    pub fn root(home_path: RemotePath) -> Self {
        Self {
            id: ItemId::root(),
            is_directory: true,
            name: String::new(),
            container_path: home_path,
            version_token: None,
            size: 0,
            modified_at: DateTime::<Utc>::default(),
            status: ItemStatus::Normal,
            last_error: None,
        }
    }

    /// Sets the version token (builder style)
    pub fn with_version_token(mut self, token: VersionToken) -> Self {
        self.version_token = Some(token);
        self
    }

    // --- Getters ---

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn is_root(&self) -> bool {
        self.id.is_root()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn container_path(&self) -> &RemotePath {
        &self.container_path
    }

    pub fn version_token(&self) -> Option<&VersionToken> {
        self.version_token.as_ref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&ErrorInfo> {
        self.last_error.as_ref()
    }

    /// The item's own remote path (`container_path/name`)
    ///
    /// For the root record this is the home path.
    pub fn remote_path(&self) -> RemotePath {
        if self.is_root() {
            return self.container_path.clone();
        }
        // Names are validated at construction, so the join cannot fail.
        self.container_path
            .join(&self.name)
            .unwrap_or_else(|_| self.container_path.clone())
    }
}

// ============================================================================
// State transition methods
// ============================================================================

impl ItemRecord {
    /// Attempts to transition to a new status
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the transition is not allowed.
    pub fn transition_to(&mut self, target: ItemStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.status.name().to_string(),
                to: target.name().to_string(),
            });
        }

        if target == ItemStatus::Normal {
            self.last_error = None;
        } else if self.status.is_error() && target.is_transferring() {
            if let Some(ref mut error) = self.last_error {
                error.record_retry();
            }
        }

        self.status = target;
        Ok(())
    }

    /// Enters the in-flight status for a transfer
    ///
    /// A record already in that status (an imported file, or one recovered
    /// after a restart) is accepted as-is.
    pub fn begin_transfer(&mut self, kind: TransferKind) -> Result<(), DomainError> {
        let target = ItemStatus::in_flight(kind);
        if self.status == target {
            return Ok(());
        }
        if self.is_directory {
            return Err(DomainError::InvalidRecord(format!(
                "Cannot {kind} directory {}",
                self.id
            )));
        }
        self.transition_to(target)
    }

    /// Applies a successful download
    ///
    /// `token` and `modified_at` fall back to the current values when the
    /// server did not send them.
    pub fn complete_download(
        &mut self,
        token: Option<VersionToken>,
        size: u64,
        modified_at: Option<DateTime<Utc>>,
    ) -> Result<(), DomainError> {
        self.transition_to(ItemStatus::Normal)?;
        if let Some(token) = token {
            self.version_token = Some(token);
        }
        if let Some(modified_at) = modified_at {
            self.modified_at = modified_at;
        }
        self.size = size;
        Ok(())
    }

    /// Applies a successful upload
    pub fn complete_upload(
        &mut self,
        token: Option<VersionToken>,
        modified_at: Option<DateTime<Utc>>,
    ) -> Result<(), DomainError> {
        self.transition_to(ItemStatus::Normal)?;
        if let Some(token) = token {
            self.version_token = Some(token);
        }
        if let Some(modified_at) = modified_at {
            self.modified_at = modified_at;
        }
        Ok(())
    }

    /// Records a failed transfer
    pub fn fail_transfer(&mut self, kind: TransferKind, error: ErrorInfo) -> Result<(), DomainError> {
        let retries = self.last_error.as_ref().map_or(0, ErrorInfo::retry_count);
        self.transition_to(ItemStatus::failed(kind))?;
        let mut error = error;
        error.retry_count = retries;
        self.last_error = Some(error);
        Ok(())
    }

    /// Leaves the in-flight status after a cancellation
    ///
    /// Downloads revert to `Normal`; uploads keep their local content and
    /// land in `UploadError`. Returns false when no transfer of that kind
    /// was in flight.
    pub fn cancel_transfer(&mut self, kind: TransferKind) -> Result<bool, DomainError> {
        if self.status != ItemStatus::in_flight(kind) {
            return Ok(false);
        }
        match kind {
            TransferKind::Download => self.transition_to(ItemStatus::Normal)?,
            TransferKind::Upload => {
                self.transition_to(ItemStatus::UploadError)?;
                self.last_error = Some(ErrorInfo::cancelled());
            }
        }
        Ok(true)
    }

    /// Rewrites the record under a server-assigned identifier
    pub fn promote(self, new_id: ItemId) -> Self {
        Self { id: new_id, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> RemotePath {
        RemotePath::new("/files/alice".to_string()).unwrap()
    }

    fn create_test_record() -> ItemRecord {
        ItemRecord::new_file(
            ItemId::new("R1".to_string()).unwrap(),
            "report.pdf",
            home(),
            2048,
            Utc::now(),
        )
        .unwrap()
        .with_version_token(VersionToken::new("v1".to_string()).unwrap())
    }

    mod item_status_tests {
        use super::*;

        #[test]
        fn test_valid_transitions() {
            use ItemStatus::*;
            assert!(Normal.can_transition_to(InDownload));
            assert!(Normal.can_transition_to(InUpload));
            assert!(InDownload.can_transition_to(Normal));
            assert!(InDownload.can_transition_to(DownloadError));
            assert!(InUpload.can_transition_to(Normal));
            assert!(InUpload.can_transition_to(UploadError));
            assert!(DownloadError.can_transition_to(InDownload));
            assert!(DownloadError.can_transition_to(Normal));
            assert!(UploadError.can_transition_to(InUpload));
            assert!(UploadError.can_transition_to(Normal));
        }

        #[test]
        fn test_no_concurrent_download_and_upload() {
            use ItemStatus::*;
            assert!(!InDownload.can_transition_to(InUpload));
            assert!(!InUpload.can_transition_to(InDownload));
            assert!(!Normal.can_transition_to(DownloadError));
            assert!(!Normal.can_transition_to(Normal));
        }

        #[test]
        fn test_helpers() {
            assert!(ItemStatus::InDownload.is_transferring());
            assert!(ItemStatus::UploadError.is_error());
            assert!(ItemStatus::UploadError.has_pending_changes());
            assert!(!ItemStatus::DownloadError.has_pending_changes());
            assert_eq!(
                ItemStatus::DownloadError.transfer_kind(),
                Some(TransferKind::Download)
            );
            assert_eq!(ItemStatus::Normal.transfer_kind(), None);
        }

        #[test]
        fn test_display() {
            assert_eq!(ItemStatus::InUpload.to_string(), "in_upload");
            assert_eq!(ItemStatus::DownloadError.name(), "DownloadError");
        }
    }

    mod record_tests {
        use super::*;

        #[test]
        fn test_new_file() {
            let record = create_test_record();
            assert_eq!(record.name(), "report.pdf");
            assert_eq!(record.size(), 2048);
            assert_eq!(record.status(), ItemStatus::Normal);
            assert_eq!(record.remote_path().as_str(), "/files/alice/report.pdf");
            assert!(!record.is_directory());
        }

        #[test]
        fn test_rejects_invalid_names() {
            let id = ItemId::new("R2".to_string()).unwrap();
            assert!(ItemRecord::new_file(id.clone(), "", home(), 0, Utc::now()).is_err());
            assert!(ItemRecord::new_file(id.clone(), "a/b", home(), 0, Utc::now()).is_err());
            assert!(ItemRecord::new_directory(id, "..", home(), Utc::now()).is_err());
        }

        #[test]
        fn test_root_record() {
            let root = ItemRecord::root(home());
            assert!(root.is_root());
            assert!(root.is_directory());
            assert_eq!(root.remote_path(), home());
        }

        #[test]
        fn test_import_starts_in_upload() {
            let record =
                ItemRecord::new_import(ItemId::temporary(), "photo.jpg", home(), 500_000).unwrap();
            assert_eq!(record.status(), ItemStatus::InUpload);
            assert!(record.version_token().is_none());
        }

        #[test]
        fn test_promote_keeps_fields() {
            let record =
                ItemRecord::new_import(ItemId::temporary(), "photo.jpg", home(), 500_000).unwrap();
            let promoted = record.clone().promote(ItemId::new("R9".to_string()).unwrap());
            assert_eq!(promoted.id().as_str(), "R9");
            assert_eq!(promoted.name(), record.name());
            assert_eq!(promoted.size(), record.size());
        }
    }

    mod transition_tests {
        use super::*;

        #[test]
        fn test_download_success() {
            let mut record = create_test_record();
            record.begin_transfer(TransferKind::Download).unwrap();
            assert_eq!(record.status(), ItemStatus::InDownload);

            let token = VersionToken::new("v2".to_string()).unwrap();
            record.complete_download(Some(token), 4096, None).unwrap();
            assert_eq!(record.status(), ItemStatus::Normal);
            assert_eq!(record.version_token().unwrap().as_str(), "v2");
            assert_eq!(record.size(), 4096);
        }

        #[test]
        fn test_download_failure_then_retry() {
            let mut record = create_test_record();
            record.begin_transfer(TransferKind::Download).unwrap();
            record
                .fail_transfer(
                    TransferKind::Download,
                    ErrorInfo::transfer_failed("not found").with_status_code(404),
                )
                .unwrap();
            assert_eq!(record.status(), ItemStatus::DownloadError);
            assert_eq!(record.last_error().unwrap().status_code(), Some(404));

            record.begin_transfer(TransferKind::Download).unwrap();
            assert_eq!(record.last_error().unwrap().retry_count(), 1);

            record.complete_download(None, 2048, None).unwrap();
            assert_eq!(record.status(), ItemStatus::Normal);
            assert!(record.last_error().is_none());
            assert_eq!(record.version_token().unwrap().as_str(), "v1");
        }

        #[test]
        fn test_upload_rejected_while_downloading() {
            let mut record = create_test_record();
            record.begin_transfer(TransferKind::Download).unwrap();
            let err = record.begin_transfer(TransferKind::Upload).unwrap_err();
            assert!(matches!(err, DomainError::InvalidState { .. }));
        }

        #[test]
        fn test_begin_transfer_is_idempotent_for_same_kind() {
            let mut record =
                ItemRecord::new_import(ItemId::temporary(), "a.txt", home(), 1).unwrap();
            assert!(record.begin_transfer(TransferKind::Upload).is_ok());
            assert_eq!(record.status(), ItemStatus::InUpload);
        }

        #[test]
        fn test_directories_do_not_transfer() {
            let mut dir = ItemRecord::new_directory(
                ItemId::new("D1".to_string()).unwrap(),
                "Photos",
                home(),
                Utc::now(),
            )
            .unwrap();
            assert!(dir.begin_transfer(TransferKind::Download).is_err());
        }

        #[test]
        fn test_cancel_download_reverts_to_normal() {
            let mut record = create_test_record();
            record.begin_transfer(TransferKind::Download).unwrap();
            assert!(record.cancel_transfer(TransferKind::Download).unwrap());
            assert_eq!(record.status(), ItemStatus::Normal);
            // second cancel is a no-op
            assert!(!record.cancel_transfer(TransferKind::Download).unwrap());
        }

        #[test]
        fn test_cancel_upload_keeps_error() {
            let mut record =
                ItemRecord::new_import(ItemId::temporary(), "a.txt", home(), 1).unwrap();
            assert!(record.cancel_transfer(TransferKind::Upload).unwrap());
            assert_eq!(record.status(), ItemStatus::UploadError);
            assert_eq!(record.last_error().unwrap().code(), CODE_CANCELLED);
        }

        #[test]
        fn test_upload_success_clears_error() {
            let mut record =
                ItemRecord::new_import(ItemId::temporary(), "a.txt", home(), 1).unwrap();
            record
                .fail_transfer(TransferKind::Upload, ErrorInfo::unreachable("timed out"))
                .unwrap();
            record.begin_transfer(TransferKind::Upload).unwrap();
            let token = VersionToken::new("\"abc\"".to_string()).unwrap();
            record.complete_upload(Some(token), None).unwrap();
            assert_eq!(record.status(), ItemStatus::Normal);
            assert!(record.last_error().is_none());
            assert_eq!(record.version_token().unwrap().as_str(), "abc");
        }
    }

    mod error_info_tests {
        use super::*;

        #[test]
        fn test_display() {
            let mut info = ErrorInfo::transfer_failed("Locked").with_status_code(423);
            assert_eq!(info.to_string(), "[TRANSFER_FAILED] Locked (HTTP 423)");
            info.record_retry();
            assert_eq!(
                info.to_string(),
                "[TRANSFER_FAILED] Locked (HTTP 423) (retries: 1)"
            );
        }

        #[test]
        fn test_failure_keeps_retry_count() {
            let mut record = create_test_record();
            record.begin_transfer(TransferKind::Download).unwrap();
            record
                .fail_transfer(TransferKind::Download, ErrorInfo::transfer_failed("a"))
                .unwrap();
            record.begin_transfer(TransferKind::Download).unwrap();
            record
                .fail_transfer(TransferKind::Download, ErrorInfo::transfer_failed("b"))
                .unwrap();
            let error = record.last_error().unwrap();
            assert_eq!(error.message(), "b");
            assert_eq!(error.retry_count(), 1);
        }
    }
}
