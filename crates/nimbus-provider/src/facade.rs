//! Provider facade.
//!
//! Maps the host's lifecycle events (materialize, content changed, import,
//! evict) onto the identifier resolver, the transfer engine and the
//! completion queue. Every call receives the account context explicitly;
//! events are independent of each other and only the per-item state
//! machine orders them.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use nimbus_core::{
    domain::{AccountContext, ItemId, ItemIdentifier, ItemRecord, ItemView, RemotePath},
    ports::{IRemoteTransport, IStateRepository},
    usecases::IdentifierResolver,
};
use tokio::sync::broadcast;

use crate::{
    completion::{CompletionHandle, CompletionQueue},
    enumerator::{ChangeBatch, Enumerator},
    error::{ProviderError, Result},
    signal::{SignalBus, SyncAnchor},
    storage::LocalStorage,
    transfer::{TransferEngine, TransferHandle},
};

/// Entry point of the synchronization engine
#[derive(Clone)]
pub struct ProviderFacade {
    repository: Arc<dyn IStateRepository>,
    resolver: IdentifierResolver,
    storage: LocalStorage,
    completion: CompletionHandle,
    engine: TransferEngine,
    enumerator: Enumerator,
    signals: SignalBus,
}

impl ProviderFacade {
    /// Wires the engine together and spawns the completion queue on the
    /// current tokio runtime
    pub fn start(
        repository: Arc<dyn IStateRepository>,
        transport: Arc<dyn IRemoteTransport>,
        storage: LocalStorage,
        max_concurrent_transfers: usize,
    ) -> Self {
        let signals = SignalBus::new();
        let (queue, completion) =
            CompletionQueue::new(Arc::clone(&repository), storage.clone(), signals.clone());
        tokio::spawn(queue.run());

        Self::from_parts(
            repository,
            transport,
            storage,
            signals,
            completion,
            max_concurrent_transfers,
        )
    }

    /// Builds a facade around an already running completion queue
    pub fn from_parts(
        repository: Arc<dyn IStateRepository>,
        transport: Arc<dyn IRemoteTransport>,
        storage: LocalStorage,
        signals: SignalBus,
        completion: CompletionHandle,
        max_concurrent_transfers: usize,
    ) -> Self {
        let engine = TransferEngine::new(
            transport,
            Arc::clone(&repository),
            storage.clone(),
            completion.clone(),
            max_concurrent_transfers,
        );
        Self {
            resolver: IdentifierResolver::new(Arc::clone(&repository)),
            enumerator: Enumerator::new(Arc::clone(&repository), signals.clone()),
            repository,
            storage,
            completion,
            engine,
            signals,
        }
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Receives the containers asked to re-enumerate
    pub fn subscribe(&self) -> broadcast::Receiver<ItemIdentifier> {
        self.signals.subscribe()
    }

    async fn require_record(
        &self,
        ctx: &AccountContext,
        identifier: &ItemIdentifier,
    ) -> Result<ItemRecord> {
        self.resolver
            .resolve_record(ctx, identifier)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("No item for identifier {identifier}")))
    }
}

// ============================================================================
// Metadata and enumeration
// ============================================================================

impl ProviderFacade {
    /// Presentation view of one item
    ///
    /// # Errors
    ///
    /// `NotFound` when the item or its parent container is not catalogued.
    pub async fn item(&self, ctx: &AccountContext, identifier: &ItemIdentifier) -> Result<ItemView> {
        let record = self.require_record(ctx, identifier).await?;
        let parent = self
            .resolver
            .resolve_parent_identifier(ctx, &record)
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!("Parent of {identifier} is not enumerable yet"))
            })?;
        self.enumerator.view(&record, parent).await
    }

    pub async fn enumerate(
        &self,
        ctx: &AccountContext,
        container: &ItemIdentifier,
    ) -> Result<Vec<ItemView>> {
        self.enumerator.enumerate(ctx, container).await
    }

    pub async fn changes_since(
        &self,
        ctx: &AccountContext,
        container: &ItemIdentifier,
        anchor: SyncAnchor,
    ) -> Result<ChangeBatch> {
        self.enumerator.changes_since(ctx, container, anchor).await
    }

    /// The anchor to start observing changes from
    pub fn current_anchor(&self) -> SyncAnchor {
        self.signals.current_anchor()
    }

    /// Identifier of the item whose content lives at `path`
    pub async fn identifier_for_path(
        &self,
        ctx: &AccountContext,
        path: &Path,
    ) -> Result<ItemIdentifier> {
        let identifier = self.storage.identifier_from_path(path).ok_or_else(|| {
            ProviderError::NotFound(format!("{} is not inside local storage", path.display()))
        })?;
        self.require_record(ctx, &identifier).await?;
        Ok(identifier)
    }

    /// Local content path of an item
    pub async fn path_for_identifier(
        &self,
        ctx: &AccountContext,
        identifier: &ItemIdentifier,
    ) -> Result<PathBuf> {
        let record = self.require_record(ctx, identifier).await?;
        if record.is_root() {
            return Ok(self.storage.root().to_path_buf());
        }
        Ok(self.storage.content_path(record.id(), record.name()))
    }
}

// ============================================================================
// Lifecycle events
// ============================================================================

impl ProviderFacade {
    /// Makes the content of an item available locally
    ///
    /// Succeeds immediately when the cached content is current; otherwise
    /// starts (or joins) a download.
    pub async fn materialize(
        &self,
        ctx: &AccountContext,
        identifier: &ItemIdentifier,
    ) -> Result<TransferHandle> {
        let record = self.require_record(ctx, identifier).await?;
        self.engine.begin_download(ctx, &record).await
    }

    /// Pushes locally modified content at `path` to the server
    pub async fn content_changed(&self, ctx: &AccountContext, path: &Path) -> Result<TransferHandle> {
        let identifier = self.identifier_for_path(ctx, path).await?;
        let record = self.require_record(ctx, &identifier).await?;
        tracing::debug!(item_id = %record.id(), remote = %record.remote_path(), "Local content changed");
        self.engine.begin_upload(ctx, &record).await
    }

    /// Adds a local file to the `parent` container and uploads it
    ///
    /// The item lives under a temporary identifier until the server assigns
    /// its own. A name already taken in the container gets a ` (n)` suffix.
    pub async fn import(
        &self,
        ctx: &AccountContext,
        source: &Path,
        parent: &ItemIdentifier,
    ) -> Result<TransferHandle> {
        let metadata = tokio::fs::metadata(source).await?;
        if metadata.is_dir() {
            return Err(ProviderError::InvalidRecord(format!(
                "Cannot import directory {}",
                source.display()
            )));
        }
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ProviderError::InvalidRecord(format!("{} has no usable file name", source.display()))
            })?;

        let container = self.require_record(ctx, parent).await?;
        if !container.is_directory() {
            return Err(ProviderError::InvalidRecord(format!(
                "{parent} is not a directory"
            )));
        }
        let container_path = container.remote_path();
        let name = self.available_name(&container_path, name).await?;

        let temp_id = ItemId::temporary();
        let (location, size) = self.storage.import_file(source, &temp_id, &name).await?;
        let record = ItemRecord::new_import(temp_id, name, container_path, size)?;

        tracing::info!(
            item_id = %record.id(),
            name = record.name(),
            size,
            %parent,
            "Importing local file"
        );
        self.completion
            .import_record(ctx, record.clone(), location)
            .await?;
        self.engine.begin_upload(ctx, &record).await
    }

    /// First name of the form `name`, `stem (1).ext`, `stem (2).ext`, ...
    /// not taken in `container`
    async fn available_name(&self, container: &RemotePath, name: &str) -> Result<String> {
        let mut candidate = name.to_string();
        let mut n = 0;
        while self
            .repository
            .find_child(container, &candidate)
            .await?
            .is_some()
        {
            n += 1;
            candidate = numbered_name(name, n);
        }
        Ok(candidate)
    }

    /// Drops the local content of the item at `path`
    ///
    /// The record stays and can be materialized again; an empty placeholder
    /// remains at the content path.
    ///
    /// # Errors
    ///
    /// `PendingChanges` while local modifications are not uploaded or an
    /// upload is outstanding.
    pub async fn evict(&self, ctx: &AccountContext, path: &Path) -> Result<()> {
        let identifier = self.identifier_for_path(ctx, path).await?;
        let record = self.require_record(ctx, &identifier).await?;
        if record.is_directory() {
            return Err(ProviderError::InvalidRecord(format!(
                "Cannot evict directory {identifier}"
            )));
        }
        if record.status().has_pending_changes() {
            return Err(ProviderError::PendingChanges(format!(
                "{identifier} has changes that are not uploaded"
            )));
        }

        // An upload that has not entered `InUpload` yet still reads as Normal
        let content = self.storage.content_path(record.id(), record.name());
        self.engine.cancel_download(&content).await?;

        self.storage.remove_content(record.id(), record.name())?;
        self.storage.remove_partial(record.id(), record.name())?;
        self.storage.write_placeholder(record.id(), record.name())?;
        self.completion.evicted(ctx, record.id().clone()).await?;

        tracing::info!(item_id = %record.id(), "Content evicted");
        Ok(())
    }

    /// Cancels any transfer outstanding for the item
    ///
    /// Returns false when nothing was outstanding.
    pub async fn cancel(&self, ctx: &AccountContext, identifier: &ItemIdentifier) -> Result<bool> {
        let path = self.path_for_identifier(ctx, identifier).await?;
        Ok(self.engine.cancel(&path).await)
    }

    /// Releases records a previous process left in flight
    pub async fn recover_interrupted(&self, ctx: &AccountContext) -> Result<usize> {
        self.completion.recover_interrupted(ctx).await
    }

    /// Cancels every outstanding transfer
    pub async fn shutdown(&self) {
        tracing::debug!(outstanding = self.engine.active_count(), "Shutting down transfers");
        let cancelled = self.engine.cancel_all().await;
        if cancelled > 0 {
            tracing::info!(cancelled, "Cancelled outstanding transfers");
        }
    }
}

fn numbered_name(name: &str, n: u32) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{} ({n}){}", &name[..dot], &name[dot..]),
        _ => format!("{name} ({n})"),
    }
}
