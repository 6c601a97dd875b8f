//! Transfer descriptors shared by the engine and the ports

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{CorrelationToken, ItemId, RemotePath};

/// Direction of a background transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Download,
    Upload,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Download => write!(f, "download"),
            TransferKind::Upload => write!(f, "upload"),
        }
    }
}

/// One in-flight background network operation
///
/// At most one exists per `target_local_path`. For downloads the target is
/// where content lands; for uploads it is the content being sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOperation {
    pub correlation_token: CorrelationToken,
    pub kind: TransferKind,
    pub item_id: ItemId,
    pub target_local_path: PathBuf,
    pub remote_path: RemotePath,
    pub started_at: DateTime<Utc>,
}

impl TransferOperation {
    pub fn new(
        kind: TransferKind,
        item_id: ItemId,
        target_local_path: PathBuf,
        remote_path: RemotePath,
    ) -> Self {
        Self {
            correlation_token: CorrelationToken::from(&item_id),
            kind,
            item_id,
            target_local_path,
            remote_path,
            started_at: Utc::now(),
        }
    }
}
