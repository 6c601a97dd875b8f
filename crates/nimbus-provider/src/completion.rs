//! Serialized completion handling.
//!
//! Provides `CompletionQueue`, the single writer of item records and local
//! cache entries. Transfer tasks, the facade and startup recovery send
//! `CompletionOp`s through a cloneable `CompletionHandle`; the queue applies
//! them one at a time, so catalogue mutations of different operations are
//! never interleaved, and emits the matching change signals.
//!
//! ```text
//! ┌───────────────┐  CompletionOp   ┌──────────────────┐      ┌────────────┐
//! │ transfer task │ ──────────────► │ CompletionQueue  │ ───► │ catalogue  │
//! │   / facade    │                 │      task        │      └────────────┘
//! └───────────────┘                 └──────────────────┘
//!        ▲                                   │ signal
//!        │      Result via oneshot           ▼
//!        └─────────────────────────── ┌─────────────┐
//!                                     │  SignalBus  │
//!                                     └─────────────┘
//! ```

use std::{path::PathBuf, sync::Arc};

use nimbus_core::{
    domain::{
        AccountContext, ErrorInfo, ItemId, ItemIdentifier, ItemRecord, ItemStatus,
        LocalCacheEntry, TransferKind,
    },
    ports::{IStateRepository, RecordFilter, TransportResponse},
    usecases::IdentifierResolver,
};
use tokio::sync::{mpsc, oneshot};

use crate::{
    error::{ProviderError, Result},
    signal::{Change, SignalBus},
    storage::LocalStorage,
};

/// Buffered operations before senders wait
const QUEUE_CAPACITY: usize = 100;

// ============================================================================
// CompletionOp enum
// ============================================================================

/// Catalogue mutations applied by the completion queue
///
/// Each variant carries the account context used to resolve the parent
/// container for signaling, plus a oneshot sender for the result.
#[derive(Debug)]
pub enum CompletionOp {
    /// Move a record into the in-flight status of a transfer
    BeginTransfer {
        ctx: AccountContext,
        item_id: ItemId,
        kind: TransferKind,
        reply: oneshot::Sender<Result<ItemRecord>>,
    },

    /// Apply a successful download whose content now sits at `location`
    DownloadFinished {
        ctx: AccountContext,
        item_id: ItemId,
        response: TransportResponse,
        location: PathBuf,
        reply: oneshot::Sender<Result<ItemRecord>>,
    },

    /// Apply a successful upload, promoting a temporary identifier
    UploadFinished {
        ctx: AccountContext,
        item_id: ItemId,
        response: TransportResponse,
        reply: oneshot::Sender<Result<ItemRecord>>,
    },

    /// Record a failed transfer on the item
    TransferFailed {
        ctx: AccountContext,
        item_id: ItemId,
        kind: TransferKind,
        error: ErrorInfo,
        reply: oneshot::Sender<Result<ItemRecord>>,
    },

    /// Leave the in-flight status after a cancellation
    TransferCancelled {
        ctx: AccountContext,
        item_id: ItemId,
        kind: TransferKind,
        reply: oneshot::Sender<Result<Option<ItemRecord>>>,
    },

    /// Store a freshly imported record together with its local content
    ImportRecord {
        ctx: AccountContext,
        record: Box<ItemRecord>,
        location: PathBuf,
        reply: oneshot::Sender<Result<()>>,
    },

    /// Forget the cached content of an item
    Evicted {
        ctx: AccountContext,
        item_id: ItemId,
        reply: oneshot::Sender<Result<()>>,
    },

    /// Release records left in flight by a previous process
    RecoverInterrupted {
        ctx: AccountContext,
        reply: oneshot::Sender<Result<usize>>,
    },
}

// ============================================================================
// CompletionHandle
// ============================================================================

/// Handle for sending operations to the CompletionQueue
///
/// This handle can be cloned and shared across tasks. All operations are
/// processed sequentially by the queue task.
#[derive(Clone)]
pub struct CompletionHandle {
    tx: mpsc::Sender<CompletionOp>,
}

impl CompletionHandle {
    /// Sends an operation and waits until the queue has processed it
    async fn call<T>(
        &self,
        op: impl FnOnce(oneshot::Sender<Result<T>>) -> CompletionOp,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(op(tx))
            .await
            .map_err(|_| ProviderError::QueueClosed)?;

        rx.await.map_err(|_| {
            ProviderError::Database("CompletionQueue response lost".to_string())
        })?
    }

    pub async fn begin_transfer(
        &self,
        ctx: &AccountContext,
        item_id: ItemId,
        kind: TransferKind,
    ) -> Result<ItemRecord> {
        let ctx = ctx.clone();
        self.call(|reply| CompletionOp::BeginTransfer {
            ctx,
            item_id,
            kind,
            reply,
        })
        .await
    }

    pub async fn download_finished(
        &self,
        ctx: &AccountContext,
        item_id: ItemId,
        response: TransportResponse,
        location: PathBuf,
    ) -> Result<ItemRecord> {
        let ctx = ctx.clone();
        self.call(|reply| CompletionOp::DownloadFinished {
            ctx,
            item_id,
            response,
            location,
            reply,
        })
        .await
    }

    /// Returns the record as stored afterwards, under its final identifier
    pub async fn upload_finished(
        &self,
        ctx: &AccountContext,
        item_id: ItemId,
        response: TransportResponse,
    ) -> Result<ItemRecord> {
        let ctx = ctx.clone();
        self.call(|reply| CompletionOp::UploadFinished {
            ctx,
            item_id,
            response,
            reply,
        })
        .await
    }

    pub async fn transfer_failed(
        &self,
        ctx: &AccountContext,
        item_id: ItemId,
        kind: TransferKind,
        error: ErrorInfo,
    ) -> Result<ItemRecord> {
        let ctx = ctx.clone();
        self.call(|reply| CompletionOp::TransferFailed {
            ctx,
            item_id,
            kind,
            error,
            reply,
        })
        .await
    }

    /// Returns `None` when the record no longer exists
    pub async fn transfer_cancelled(
        &self,
        ctx: &AccountContext,
        item_id: ItemId,
        kind: TransferKind,
    ) -> Result<Option<ItemRecord>> {
        let ctx = ctx.clone();
        self.call(|reply| CompletionOp::TransferCancelled {
            ctx,
            item_id,
            kind,
            reply,
        })
        .await
    }

    pub async fn import_record(
        &self,
        ctx: &AccountContext,
        record: ItemRecord,
        location: PathBuf,
    ) -> Result<()> {
        let ctx = ctx.clone();
        self.call(|reply| CompletionOp::ImportRecord {
            ctx,
            record: Box::new(record),
            location,
            reply,
        })
        .await
    }

    pub async fn evicted(&self, ctx: &AccountContext, item_id: ItemId) -> Result<()> {
        let ctx = ctx.clone();
        self.call(|reply| CompletionOp::Evicted {
            ctx,
            item_id,
            reply,
        })
        .await
    }

    /// Returns the number of records released
    pub async fn recover_interrupted(&self, ctx: &AccountContext) -> Result<usize> {
        let ctx = ctx.clone();
        self.call(|reply| CompletionOp::RecoverInterrupted { ctx, reply })
            .await
    }
}

// ============================================================================
// CompletionQueue
// ============================================================================

/// Single consumer applying catalogue mutations in arrival order
///
/// The caller must spawn the queue as a tokio task by calling `run()`; it
/// stops once every handle has been dropped.
pub struct CompletionQueue {
    rx: mpsc::Receiver<CompletionOp>,
    repository: Arc<dyn IStateRepository>,
    resolver: IdentifierResolver,
    storage: LocalStorage,
    signals: SignalBus,
}

impl CompletionQueue {
    pub fn new(
        repository: Arc<dyn IStateRepository>,
        storage: LocalStorage,
        signals: SignalBus,
    ) -> (Self, CompletionHandle) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let queue = Self {
            rx,
            resolver: IdentifierResolver::new(Arc::clone(&repository)),
            repository,
            storage,
            signals,
        };
        (queue, CompletionHandle { tx })
    }

    /// Runs the completion loop until all handles are dropped
    pub async fn run(mut self) {
        tracing::info!("CompletionQueue task started");

        while let Some(op) = self.rx.recv().await {
            self.process_operation(op).await;
        }

        tracing::info!("CompletionQueue task stopped (all handles dropped)");
    }

    async fn process_operation(&self, op: CompletionOp) {
        match op {
            CompletionOp::BeginTransfer {
                ctx,
                item_id,
                kind,
                reply,
            } => {
                tracing::trace!(%item_id, %kind, "Processing BeginTransfer");
                let _ = reply.send(self.begin_transfer(&ctx, &item_id, kind).await);
            }

            CompletionOp::DownloadFinished {
                ctx,
                item_id,
                response,
                location,
                reply,
            } => {
                tracing::trace!(%item_id, status = response.status, "Processing DownloadFinished");
                let result = self
                    .download_finished(&ctx, &item_id, response, location)
                    .await;
                let _ = reply.send(result);
            }

            CompletionOp::UploadFinished {
                ctx,
                item_id,
                response,
                reply,
            } => {
                tracing::trace!(%item_id, status = response.status, "Processing UploadFinished");
                let _ = reply.send(self.upload_finished(&ctx, &item_id, response).await);
            }

            CompletionOp::TransferFailed {
                ctx,
                item_id,
                kind,
                error,
                reply,
            } => {
                tracing::trace!(%item_id, %kind, "Processing TransferFailed");
                let result = self.transfer_failed(&ctx, &item_id, kind, error).await;
                let _ = reply.send(result);
            }

            CompletionOp::TransferCancelled {
                ctx,
                item_id,
                kind,
                reply,
            } => {
                tracing::trace!(%item_id, %kind, "Processing TransferCancelled");
                let _ = reply.send(self.transfer_cancelled(&ctx, &item_id, kind).await);
            }

            CompletionOp::ImportRecord {
                ctx,
                record,
                location,
                reply,
            } => {
                tracing::trace!(item_id = %record.id(), "Processing ImportRecord");
                let _ = reply.send(self.import_record(&ctx, &record, location).await);
            }

            CompletionOp::Evicted {
                ctx,
                item_id,
                reply,
            } => {
                tracing::trace!(%item_id, "Processing Evicted");
                let _ = reply.send(self.evicted(&ctx, &item_id).await);
            }

            CompletionOp::RecoverInterrupted { ctx, reply } => {
                tracing::trace!("Processing RecoverInterrupted");
                let _ = reply.send(self.recover_interrupted(&ctx).await);
            }
        }
    }
}

// ============================================================================
// Operation bodies
// ============================================================================

impl CompletionQueue {
    async fn load(&self, id: &ItemId) -> Result<ItemRecord> {
        self.repository
            .get_record(id)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("Item not found: {id}")))
    }

    /// Parent container of `record`, if it can be resolved
    async fn parent_of(&self, ctx: &AccountContext, record: &ItemRecord) -> Option<ItemIdentifier> {
        match self.resolver.resolve_parent_identifier(ctx, record).await {
            Ok(parent) => parent,
            Err(e) => {
                tracing::warn!(item_id = %record.id(), error = %e, "Failed to resolve parent for signaling");
                None
            }
        }
    }

    async fn signal(&self, ctx: &AccountContext, record: &ItemRecord, change: Change) {
        let parent = self.parent_of(ctx, record).await;
        self.signals.signal(record.id(), parent.as_ref(), change);
    }

    async fn begin_transfer(
        &self,
        ctx: &AccountContext,
        id: &ItemId,
        kind: TransferKind,
    ) -> Result<ItemRecord> {
        let mut record = self.load(id).await?;
        let before = record.status();
        record.begin_transfer(kind)?;
        if record.status() != before {
            self.repository.upsert_record(&record).await?;
            self.signal(ctx, &record, Change::Updated).await;
        }
        Ok(record)
    }

    async fn download_finished(
        &self,
        ctx: &AccountContext,
        id: &ItemId,
        response: TransportResponse,
        location: PathBuf,
    ) -> Result<ItemRecord> {
        let mut record = self.load(id).await?;
        let modified_at = response.last_modified.or(response.date);
        record.complete_download(response.version_token, response.bytes, modified_at)?;

        let entry = LocalCacheEntry::for_record(&record, location);
        self.repository.save_record_with_entry(&record, &entry).await?;

        tracing::info!(item_id = %id, bytes = response.bytes, "Download applied");
        self.signal(ctx, &record, Change::Updated).await;
        Ok(record)
    }

    async fn upload_finished(
        &self,
        ctx: &AccountContext,
        id: &ItemId,
        response: TransportResponse,
    ) -> Result<ItemRecord> {
        let mut record = self.load(id).await?;
        record.complete_upload(response.version_token, response.date)?;

        let new_id = match response.file_id {
            Some(new_id) => new_id,
            None => {
                tracing::warn!(item_id = %id, "Upload response carried no file id, keeping identifier");
                id.clone()
            }
        };

        if new_id == *id {
            let location = self.storage.content_path(id, record.name());
            let entry = LocalCacheEntry::for_record(&record, location);
            self.repository.save_record_with_entry(&record, &entry).await?;
            self.signal(ctx, &record, Change::Updated).await;
            return Ok(record);
        }

        self.promote(ctx, id, record.promote(new_id)).await
    }

    /// Rewrites a record under its server-assigned identifier
    ///
    /// Order: catalogue transaction, content move, delete signal for the
    /// temporary identifier, update signal for the new one, then the
    /// re-enumeration triggers.
    async fn promote(
        &self,
        ctx: &AccountContext,
        old_id: &ItemId,
        record: ItemRecord,
    ) -> Result<ItemRecord> {
        let new_id = record.id().clone();
        let location = self.storage.content_path(&new_id, record.name());
        let entry = LocalCacheEntry::for_record(&record, location);
        self.repository
            .promote_record(old_id, &record, Some(&entry))
            .await?;

        if let Err(e) = self.storage.move_item_dir(old_id, &new_id) {
            tracing::error!(
                old_id = %old_id,
                new_id = %new_id,
                error = %e,
                "Failed to move content of promoted item"
            );
        }

        let parent = self.parent_of(ctx, &record).await;
        self.signals
            .enqueue_for_observers(old_id, parent.as_ref(), Change::Deleted);
        self.signals
            .enqueue_for_observers(&new_id, parent.as_ref(), Change::Updated);
        self.signals.trigger_observers(parent.as_ref());

        tracing::info!(old_id = %old_id, new_id = %new_id, "Identity promoted");
        Ok(record)
    }

    async fn transfer_failed(
        &self,
        ctx: &AccountContext,
        id: &ItemId,
        kind: TransferKind,
        error: ErrorInfo,
    ) -> Result<ItemRecord> {
        let mut record = self.load(id).await?;
        tracing::error!(item_id = %id, %kind, error = %error, "Transfer failed");
        record.fail_transfer(kind, error)?;
        self.repository.upsert_record(&record).await?;
        self.signal(ctx, &record, Change::Updated).await;
        Ok(record)
    }

    async fn transfer_cancelled(
        &self,
        ctx: &AccountContext,
        id: &ItemId,
        kind: TransferKind,
    ) -> Result<Option<ItemRecord>> {
        let Some(mut record) = self.repository.get_record(id).await? else {
            return Ok(None);
        };
        if record.cancel_transfer(kind)? {
            self.repository.upsert_record(&record).await?;
            self.signal(ctx, &record, Change::Updated).await;
        }
        Ok(Some(record))
    }

    async fn import_record(
        &self,
        ctx: &AccountContext,
        record: &ItemRecord,
        location: PathBuf,
    ) -> Result<()> {
        let entry = LocalCacheEntry::for_record(record, location);
        self.repository.save_record_with_entry(record, &entry).await?;
        self.signal(ctx, record, Change::Updated).await;
        Ok(())
    }

    async fn evicted(&self, ctx: &AccountContext, id: &ItemId) -> Result<()> {
        self.repository.delete_cache_entry(id).await?;
        let record = self.load(id).await?;
        self.signal(ctx, &record, Change::Updated).await;
        Ok(())
    }

    async fn recover_interrupted(&self, ctx: &AccountContext) -> Result<usize> {
        let mut released = 0;

        let downloads = self
            .repository
            .query_records(&RecordFilter::new().with_status(ItemStatus::InDownload))
            .await?;
        for mut record in downloads {
            record.cancel_transfer(TransferKind::Download)?;
            self.repository.upsert_record(&record).await?;
            self.signal(ctx, &record, Change::Updated).await;
            released += 1;
        }

        let uploads = self
            .repository
            .query_records(&RecordFilter::new().with_status(ItemStatus::InUpload))
            .await?;
        for mut record in uploads {
            record.fail_transfer(TransferKind::Upload, ErrorInfo::interrupted())?;
            self.repository.upsert_record(&record).await?;
            self.signal(ctx, &record, Change::Updated).await;
            released += 1;
        }

        if released > 0 {
            tracing::info!(released, "Released transfers interrupted by a restart");
        }
        Ok(released)
    }
}
