//! Background transfer engine.
//!
//! Provides `TransferEngine` for moving content between the server and local
//! storage without blocking the caller.
//!
//! ## Architecture
//!
//! The engine coordinates concurrent downloads and uploads while ensuring:
//!
//! - **At most one operation per path**: a second request of the same kind
//!   for a target path adopts the outstanding operation; a request of the
//!   other kind is rejected
//! - **Concurrency limiting**: a global semaphore bounds running transfers
//! - **Progress tracking**: watch channels carry a non-decreasing fraction
//! - **Cancellation**: in-flight transfers can be cancelled idempotently
//!
//! ```text
//! ┌───────────────┐  begin_download()  ┌─────────────────────┐
//! │    facade     │ ─────────────────► │   TransferEngine    │
//! └───────────────┘                    │  active: DashMap    │
//!        ▲                             │  semaphore: permits │
//!        │  TransferHandle             └─────────────────────┘
//!        │  (progress + result)                  │ spawn task
//!        │                                       ▼
//!        │                             ┌─────────────────────┐
//!        │                             │   Transfer task     │
//!        │                             │  - IRemoteTransport │
//!        │                             │  - LocalStorage     │
//!        │                             │  - CompletionHandle │
//!        └──────────────────────────── └─────────────────────┘
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use dashmap::{
    mapref::entry::{Entry, VacantEntry},
    DashMap,
};
use nimbus_core::{
    domain::{
        AccountContext, ErrorInfo, ItemRecord, ItemStatus, TransferKind, TransferOperation,
    },
    ports::{
        describe_status, IRemoteTransport, IStateRepository, ProgressSink, TransportError,
        TransportResponse,
    },
};
use tokio::{
    sync::{watch, Semaphore},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    completion::CompletionHandle,
    error::{ProviderError, Result},
    storage::LocalStorage,
};

// ============================================================================
// TransferResult / TransferHandle
// ============================================================================

/// Final outcome of a transfer
#[derive(Debug, Clone, PartialEq)]
pub enum TransferResult {
    Completed,
    Failed {
        message: String,
        status_code: Option<u16>,
        /// Connectivity-class failure
        unreachable: bool,
    },
    Cancelled,
}

impl TransferResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferResult::Completed)
    }

    /// Converts the outcome into the error a caller should see
    pub fn into_result(self) -> Result<()> {
        match self {
            TransferResult::Completed => Ok(()),
            TransferResult::Failed {
                message,
                unreachable: true,
                ..
            } => Err(ProviderError::ServerUnreachable(message)),
            TransferResult::Failed {
                message,
                status_code: Some(status @ (409 | 412)),
                ..
            } => Err(ProviderError::Conflict(format!("{message} (HTTP {status})"))),
            TransferResult::Failed {
                message,
                status_code,
                ..
            } => Err(ProviderError::TransferFailed {
                message,
                status_code,
            }),
            TransferResult::Cancelled => Err(ProviderError::TransferFailed {
                message: "Transfer cancelled".to_string(),
                status_code: None,
            }),
        }
    }
}

/// Observer of one transfer
///
/// Clones observe the same operation. Progress is `None` until the total
/// size is known and never decreases.
#[derive(Clone)]
pub struct TransferHandle {
    operation: Arc<TransferOperation>,
    progress: watch::Receiver<Option<f64>>,
    result: watch::Receiver<Option<TransferResult>>,
}

impl TransferHandle {
    /// A handle whose outcome is already known
    fn settled(operation: TransferOperation, result: TransferResult) -> Self {
        let progress = result.is_completed().then_some(1.0);
        let (_, progress_rx) = watch::channel(progress);
        let (_, result_rx) = watch::channel(Some(result));
        Self {
            operation: Arc::new(operation),
            progress: progress_rx,
            result: result_rx,
        }
    }

    pub fn operation(&self) -> &TransferOperation {
        &self.operation
    }

    pub fn kind(&self) -> TransferKind {
        self.operation.kind
    }

    /// Latest progress fraction in `[0, 1]`
    pub fn progress(&self) -> Option<f64> {
        *self.progress.borrow()
    }

    /// Receiver for progress updates
    pub fn subscribe_progress(&self) -> watch::Receiver<Option<f64>> {
        self.progress.clone()
    }

    /// The outcome, if the transfer has finished
    pub fn result(&self) -> Option<TransferResult> {
        self.result.borrow().clone()
    }

    /// Waits for the transfer to finish
    pub async fn wait(mut self) -> TransferResult {
        loop {
            if let Some(result) = self.result.borrow_and_update().clone() {
                return result;
            }
            if self.result.changed().await.is_err() {
                return self.result.borrow().clone().unwrap_or(TransferResult::Failed {
                    message: "Transfer task ended without a result".to_string(),
                    status_code: None,
                    unreachable: false,
                });
            }
        }
    }
}

impl fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferHandle")
            .field("item_id", &self.operation.item_id)
            .field("kind", &self.operation.kind)
            .field("progress", &self.progress())
            .field("result", &self.result())
            .finish()
    }
}

/// Publishes transport progress as a non-decreasing fraction
struct WatchProgress<'a> {
    tx: &'a watch::Sender<Option<f64>>,
}

impl ProgressSink for WatchProgress<'_> {
    fn report(&self, transferred: u64, total: Option<u64>) {
        let Some(total) = total.filter(|t| *t > 0) else {
            return;
        };
        let fraction = (transferred as f64 / total as f64).min(1.0);
        self.tx.send_if_modified(|current| match current {
            Some(previous) if *previous >= fraction => false,
            _ => {
                *current = Some(fraction);
                true
            }
        });
    }
}

// ============================================================================
// TransferEngine struct
// ============================================================================

/// Internal state for an outstanding transfer.
struct ActiveTransfer {
    /// Distinguishes operations that reuse the same path
    generation: u64,
    handle: TransferHandle,
    cancel_token: CancellationToken,
    _task_handle: JoinHandle<()>,
}

/// Runs downloads and uploads in background tasks.
///
/// Cheap to clone; clones share the active map and the concurrency limit.
#[derive(Clone)]
pub struct TransferEngine {
    /// Outstanding transfers, keyed by target local path
    active: Arc<DashMap<PathBuf, ActiveTransfer>>,
    /// Semaphore for concurrency limiting
    semaphore: Arc<Semaphore>,
    generation: Arc<AtomicU64>,
    transport: Arc<dyn IRemoteTransport>,
    /// Read access to cache entries for the cache-hit check
    repository: Arc<dyn IStateRepository>,
    storage: LocalStorage,
    completion: CompletionHandle,
}

impl TransferEngine {
    /// Creates a new `TransferEngine`.
    ///
    /// # Arguments
    ///
    /// * `transport` - Remote transport moving the bytes
    /// * `repository` - Catalogue, read for cache entries only
    /// * `storage` - Local content layout
    /// * `completion` - Handle of the queue applying outcomes
    /// * `max_concurrent` - Maximum number of transfers running at once
    pub fn new(
        transport: Arc<dyn IRemoteTransport>,
        repository: Arc<dyn IStateRepository>,
        storage: LocalStorage,
        completion: CompletionHandle,
        max_concurrent: usize,
    ) -> Self {
        Self {
            active: Arc::new(DashMap::new()),
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            generation: Arc::new(AtomicU64::new(0)),
            transport,
            repository,
            storage,
            completion,
        }
    }
}

// ============================================================================
// Starting transfers
// ============================================================================

impl TransferEngine {
    /// Materializes the content of `record` into local storage.
    ///
    /// Resolves immediately, without any network call, when a cache entry
    /// carrying the record's current version token exists.
    ///
    /// # Errors
    ///
    /// Returns `TransferInProgress` when an upload is outstanding for the
    /// same content, `PendingChanges` when local modifications are not
    /// uploaded yet, and `InvalidRecord` for directories.
    pub async fn begin_download(
        &self,
        ctx: &AccountContext,
        record: &ItemRecord,
    ) -> Result<TransferHandle> {
        let operation = self.operation_for(record, TransferKind::Download);

        if let Some(entry) = self.repository.get_cache_entry(record.id()).await? {
            if entry.is_valid_for(record) {
                tracing::debug!(item_id = %record.id(), "Cache entry is current, skipping download");
                return Ok(TransferHandle::settled(operation, TransferResult::Completed));
            }
        }

        check_can_begin(record, TransferKind::Download)?;
        self.start(ctx, operation, record.name()).await
    }

    /// Pushes the local content of `record` to its remote path.
    pub async fn begin_upload(
        &self,
        ctx: &AccountContext,
        record: &ItemRecord,
    ) -> Result<TransferHandle> {
        check_can_begin(record, TransferKind::Upload)?;
        let operation = self.operation_for(record, TransferKind::Upload);
        self.start(ctx, operation, record.name()).await
    }

    fn operation_for(&self, record: &ItemRecord, kind: TransferKind) -> TransferOperation {
        TransferOperation::new(
            kind,
            record.id().clone(),
            self.storage.content_path(record.id(), record.name()),
            record.remote_path(),
        )
    }

    /// Claims the path for `operation`, adopting an outstanding operation of
    /// the same kind
    ///
    /// A slot whose transfer is being cancelled is waited out first, so the
    /// old task has settled the record before the new one touches it.
    async fn start(
        &self,
        ctx: &AccountContext,
        operation: TransferOperation,
        name: &str,
    ) -> Result<TransferHandle> {
        let path = operation.target_local_path.clone();

        loop {
            let (generation, settling) = match self.active.entry(path.clone()) {
                Entry::Occupied(existing) => {
                    let existing = existing.get();
                    if existing.cancel_token.is_cancelled() {
                        (existing.generation, existing.handle.clone())
                    } else if existing.handle.kind() == operation.kind {
                        tracing::debug!(
                            item_id = %operation.item_id,
                            kind = %operation.kind,
                            "Transfer already outstanding, adopting it"
                        );
                        return Ok(existing.handle.clone());
                    } else {
                        return Err(ProviderError::TransferInProgress(format!(
                            "{} of {} is outstanding",
                            existing.handle.kind(),
                            path.display()
                        )));
                    }
                }
                Entry::Vacant(slot) => return Ok(self.spawn(ctx, operation, name, slot)),
            };

            tracing::debug!(path = %path.display(), "Waiting for cancelled transfer to settle");
            settling.wait().await;
            // Normally released by the task already; not if it panicked
            self.active
                .remove_if(&path, |_, active| active.generation == generation);
        }
    }

    fn spawn(
        &self,
        ctx: &AccountContext,
        operation: TransferOperation,
        name: &str,
        slot: VacantEntry<'_, PathBuf, ActiveTransfer>,
    ) -> TransferHandle {
        let path = operation.target_local_path.clone();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let (progress_tx, progress_rx) = watch::channel(None);
        let (result_tx, result_rx) = watch::channel(None);
        let operation = Arc::new(operation);
        let handle = TransferHandle {
            operation: Arc::clone(&operation),
            progress: progress_rx,
            result: result_rx,
        };
        let cancel_token = CancellationToken::new();

        tracing::info!(
            item_id = %operation.item_id,
            kind = %operation.kind,
            remote = %operation.remote_path,
            correlation = operation.correlation_token.as_str(),
            "Transfer started"
        );

        let task = TransferTask {
            ctx: ctx.clone(),
            operation,
            partial_path: self
                .storage
                .partial_path(&handle.operation.item_id, name),
            transport: Arc::clone(&self.transport),
            completion: self.completion.clone(),
            semaphore: Arc::clone(&self.semaphore),
            cancel_token: cancel_token.clone(),
            progress: progress_tx,
        };
        let active_map = Arc::clone(&self.active);

        let task_handle = tokio::spawn(async move {
            let result = task.run().await;
            // Free the path before publishing so a waiter can start anew
            active_map.remove_if(&path, |_, active| active.generation == generation);
            result_tx.send_replace(Some(result));
        });

        slot.insert(ActiveTransfer {
            generation,
            handle: handle.clone(),
            cancel_token,
            _task_handle: task_handle,
        });

        handle
    }
}

/// Rejects transfers the item's state machine cannot enter
fn check_can_begin(record: &ItemRecord, kind: TransferKind) -> Result<()> {
    if record.is_directory() {
        return Err(ProviderError::InvalidRecord(format!(
            "Cannot {kind} directory {}",
            record.id()
        )));
    }

    let status = record.status();
    let target = ItemStatus::in_flight(kind);
    if status == target || status.can_transition_to(target) {
        return Ok(());
    }

    if status.is_transferring() {
        Err(ProviderError::TransferInProgress(format!(
            "{} is {status}, cannot start {kind}",
            record.id()
        )))
    } else if status.has_pending_changes() {
        Err(ProviderError::PendingChanges(format!(
            "{} has local changes that are not uploaded",
            record.id()
        )))
    } else {
        Err(ProviderError::InvalidRecord(format!(
            "{} is {status}, cannot start {kind}",
            record.id()
        )))
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Fires the token of `active`; true when this call was the first to do so
///
/// The slot stays occupied until the task itself releases it.
fn request_cancel(active: &ActiveTransfer) -> (TransferHandle, bool) {
    let first = !active.cancel_token.is_cancelled();
    if first {
        tracing::info!(
            item_id = %active.handle.operation.item_id,
            kind = %active.handle.kind(),
            "Cancelling transfer"
        );
        active.cancel_token.cancel();
    }
    (active.handle.clone(), first)
}

async fn settle_cancelled(path: &Path, handle: TransferHandle) {
    let result = handle.wait().await;
    tracing::debug!(path = %path.display(), ?result, "Cancelled transfer settled");
}

impl TransferEngine {
    /// Cancels the transfer outstanding for `path`.
    ///
    /// Waits until the transfer task has settled the item record. Returns
    /// false when nothing was outstanding or another caller cancelled it
    /// first, so cancelling twice is a no-op.
    pub async fn cancel(&self, path: &Path) -> bool {
        let (handle, first) = {
            let Some(active) = self.active.get(path) else {
                tracing::debug!(path = %path.display(), "No active transfer to cancel");
                return false;
            };
            request_cancel(&active)
        };
        settle_cancelled(path, handle).await;
        first
    }

    /// Cancels the download outstanding for `path`, leaving uploads alone
    ///
    /// # Errors
    ///
    /// `PendingChanges` when an upload is outstanding for `path`.
    pub async fn cancel_download(&self, path: &Path) -> Result<bool> {
        let (handle, first) = {
            let Some(active) = self.active.get(path) else {
                return Ok(false);
            };
            if active.handle.kind() == TransferKind::Upload {
                return Err(ProviderError::PendingChanges(format!(
                    "Upload of {} is outstanding",
                    path.display()
                )));
            }
            request_cancel(&active)
        };
        settle_cancelled(path, handle).await;
        Ok(first)
    }

    /// Cancels every outstanding transfer
    pub async fn cancel_all(&self) -> usize {
        let paths: Vec<PathBuf> = self.active.iter().map(|a| a.key().clone()).collect();
        let mut cancelled = 0;
        for path in paths {
            if self.cancel(&path).await {
                cancelled += 1;
            }
        }
        cancelled
    }
}

// ============================================================================
// Queries
// ============================================================================

impl TransferEngine {
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferEngine")
            .field("active_count", &self.active.len())
            .field("available_permits", &self.semaphore.available_permits())
            .finish()
    }
}

// ============================================================================
// Transfer task
// ============================================================================

enum Outcome {
    Response(TransportResponse),
    Error(TransportError),
    Cancelled,
}

/// Everything one background transfer owns
struct TransferTask {
    ctx: AccountContext,
    operation: Arc<TransferOperation>,
    partial_path: PathBuf,
    transport: Arc<dyn IRemoteTransport>,
    completion: CompletionHandle,
    semaphore: Arc<Semaphore>,
    cancel_token: CancellationToken,
    progress: watch::Sender<Option<f64>>,
}

impl TransferTask {
    async fn run(self) -> TransferResult {
        let op = &self.operation;

        if let Err(e) = self
            .completion
            .begin_transfer(&self.ctx, op.item_id.clone(), op.kind)
            .await
        {
            tracing::error!(item_id = %op.item_id, kind = %op.kind, error = %e, "Failed to enter transfer state");
            return TransferResult::Failed {
                message: e.to_string(),
                status_code: None,
                unreachable: false,
            };
        }

        let outcome = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => Outcome::Cancelled,
            outcome = self.perform() => outcome,
        };

        match op.kind {
            TransferKind::Download => self.finish_download(outcome).await,
            TransferKind::Upload => self.finish_upload(outcome).await,
        }
    }

    /// Moves the bytes once a concurrency permit is available
    async fn perform(&self) -> Outcome {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => return Outcome::Cancelled,
        };

        let op = &self.operation;
        let sink = WatchProgress { tx: &self.progress };
        tracing::debug!(item_id = %op.item_id, kind = %op.kind, "Transfer running");

        let result = match op.kind {
            TransferKind::Download => {
                self.transport
                    .download(&op.remote_path, &self.partial_path, &sink)
                    .await
            }
            TransferKind::Upload => {
                self.transport
                    .upload(&op.remote_path, &op.target_local_path, &sink)
                    .await
            }
        };

        match result {
            Ok(response) => Outcome::Response(response),
            Err(e) => Outcome::Error(e),
        }
    }

    async fn finish_download(&self, outcome: Outcome) -> TransferResult {
        let op = &self.operation;

        let response = match outcome {
            Outcome::Response(response) if response.is_success() => response,
            other => {
                self.discard_partial();
                return self.settle_failure(other).await;
            }
        };

        if let Err(e) = std::fs::rename(&self.partial_path, &op.target_local_path) {
            self.discard_partial();
            let error = ErrorInfo::transfer_failed(format!("Failed to store content: {e}"));
            return self.record_failure(error, false).await;
        }

        match self
            .completion
            .download_finished(
                &self.ctx,
                op.item_id.clone(),
                response,
                op.target_local_path.clone(),
            )
            .await
        {
            Ok(_) => {
                self.progress.send_replace(Some(1.0));
                tracing::info!(item_id = %op.item_id, "Download finished");
                TransferResult::Completed
            }
            Err(e) => {
                tracing::error!(item_id = %op.item_id, error = %e, "Failed to apply download");
                // Content without a cache entry must not stay behind
                if let Err(remove_err) = std::fs::remove_file(&op.target_local_path) {
                    tracing::warn!(
                        path = %op.target_local_path.display(),
                        error = %remove_err,
                        "Failed to delete unapplied content"
                    );
                }
                self.record_failure(ErrorInfo::transfer_failed(e.to_string()), false)
                    .await
            }
        }
    }

    async fn finish_upload(&self, outcome: Outcome) -> TransferResult {
        let op = &self.operation;

        let response = match outcome {
            Outcome::Response(response) if response.is_success() => response,
            Outcome::Response(response) if matches!(response.status, 409 | 412) => {
                let error = ErrorInfo::conflict(describe_status(response.status))
                    .with_status_code(response.status);
                return self.record_failure(error, false).await;
            }
            other => return self.settle_failure(other).await,
        };

        match self
            .completion
            .upload_finished(&self.ctx, op.item_id.clone(), response)
            .await
        {
            Ok(record) => {
                self.progress.send_replace(Some(1.0));
                tracing::info!(item_id = %op.item_id, final_id = %record.id(), "Upload finished");
                TransferResult::Completed
            }
            Err(e) => {
                tracing::error!(item_id = %op.item_id, error = %e, "Failed to apply upload");
                self.record_failure(ErrorInfo::transfer_failed(e.to_string()), false)
                    .await
            }
        }
    }

    /// Applies a non-success outcome to the record
    async fn settle_failure(&self, outcome: Outcome) -> TransferResult {
        match outcome {
            Outcome::Cancelled => {
                if let Err(e) = self
                    .completion
                    .transfer_cancelled(&self.ctx, self.operation.item_id.clone(), self.operation.kind)
                    .await
                {
                    tracing::error!(item_id = %self.operation.item_id, error = %e, "Failed to settle cancelled transfer");
                }
                TransferResult::Cancelled
            }
            Outcome::Response(response) => {
                let error = ErrorInfo::transfer_failed(describe_status(response.status))
                    .with_status_code(response.status);
                self.record_failure(error, false).await
            }
            Outcome::Error(e) if e.is_unreachable() => {
                self.record_failure(ErrorInfo::unreachable(e.message), true)
                    .await
            }
            Outcome::Error(e) => {
                self.record_failure(ErrorInfo::transfer_failed(e.message), false)
                    .await
            }
        }
    }

    async fn record_failure(&self, error: ErrorInfo, unreachable: bool) -> TransferResult {
        let result = TransferResult::Failed {
            message: error.message().to_string(),
            status_code: error.status_code(),
            unreachable,
        };
        if let Err(e) = self
            .completion
            .transfer_failed(&self.ctx, self.operation.item_id.clone(), self.operation.kind, error)
            .await
        {
            tracing::error!(item_id = %self.operation.item_id, error = %e, "Failed to record transfer failure");
        }
        result
    }

    /// Partial content must never survive a failed download
    fn discard_partial(&self) {
        if let Err(e) = std::fs::remove_file(&self.partial_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.partial_path.display(),
                    error = %e,
                    "Failed to delete partial file"
                );
            }
        }
    }
}
