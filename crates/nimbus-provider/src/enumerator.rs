//! Container enumeration.
//!
//! Lists the children of a container as `ItemView`s and turns the pending
//! changes collected by the `SignalBus` into item views and deletions.

use std::{collections::BTreeSet, sync::Arc};

use nimbus_core::{
    domain::{AccountContext, ItemId, ItemIdentifier, ItemRecord, ItemView},
    ports::{IStateRepository, RecordFilter},
    usecases::IdentifierResolver,
};

use crate::{
    error::{ProviderError, Result},
    signal::{SignalBus, SyncAnchor},
};

/// Changes of one container since an anchor, ready for presentation
#[derive(Debug, Clone, Default)]
pub struct ChangeBatch {
    pub updated: Vec<ItemView>,
    pub deleted: Vec<ItemIdentifier>,
    pub anchor: SyncAnchor,
    /// The anchor was too old; enumerate the container from scratch
    pub expired: bool,
}

/// Produces item listings for containers and the working set
#[derive(Clone)]
pub struct Enumerator {
    repository: Arc<dyn IStateRepository>,
    resolver: IdentifierResolver,
    signals: SignalBus,
}

impl Enumerator {
    pub fn new(repository: Arc<dyn IStateRepository>, signals: SignalBus) -> Self {
        Self {
            resolver: IdentifierResolver::new(Arc::clone(&repository)),
            repository,
            signals,
        }
    }

    /// Lists the children of `container`, directories first, then by name
    ///
    /// # Errors
    ///
    /// `NotFound` when the container is not catalogued, `InvalidRecord`
    /// when it is a file.
    pub async fn enumerate(
        &self,
        ctx: &AccountContext,
        container: &ItemIdentifier,
    ) -> Result<Vec<ItemView>> {
        if *container == ItemIdentifier::WorkingSet {
            return self.enumerate_working_set(ctx).await;
        }

        let record = self
            .resolver
            .resolve_record(ctx, container)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("Container not found: {container}")))?;
        if !record.is_directory() {
            return Err(ProviderError::InvalidRecord(format!(
                "{container} is not a directory"
            )));
        }

        let mut children = self
            .repository
            .query_records(&RecordFilter::new().with_container_path(record.remote_path()))
            .await?;
        sort_for_listing(&mut children);

        let mut views = Vec::with_capacity(children.len());
        for child in &children {
            views.push(self.view(child, container.clone()).await?);
        }
        tracing::debug!(%container, count = views.len(), "Enumerated container");
        Ok(views)
    }

    /// Items with cached content or a favorite annotation
    async fn enumerate_working_set(&self, ctx: &AccountContext) -> Result<Vec<ItemView>> {
        let mut ids: BTreeSet<ItemId> = self
            .repository
            .list_cache_entries()
            .await?
            .into_iter()
            .map(|entry| entry.item_id().clone())
            .collect();
        ids.extend(
            self.repository
                .list_favorites()
                .await?
                .into_iter()
                .map(|annotation| annotation.item_id().clone()),
        );
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = self
            .repository
            .query_records(&RecordFilter::new().with_ids(ids.into_iter().collect()))
            .await?;
        sort_for_listing(&mut records);

        let mut views = Vec::with_capacity(records.len());
        for record in &records {
            match self.resolver.resolve_parent_identifier(ctx, record).await? {
                Some(parent) => views.push(self.view(record, parent).await?),
                None => {
                    tracing::debug!(item_id = %record.id(), "Skipping working set item without parent")
                }
            }
        }
        Ok(views)
    }

    /// Changes of `container` since `anchor`
    ///
    /// Updated items whose record has vanished are reported as deleted.
    pub async fn changes_since(
        &self,
        ctx: &AccountContext,
        container: &ItemIdentifier,
        anchor: SyncAnchor,
    ) -> Result<ChangeBatch> {
        let set = self.signals.changes_since(container, anchor);
        let mut batch = ChangeBatch {
            anchor: set.anchor,
            expired: set.expired,
            deleted: set.deleted.into_iter().map(ItemIdentifier::from).collect(),
            ..ChangeBatch::default()
        };

        for id in set.updated {
            let Some(record) = self.repository.get_record(&id).await? else {
                batch.deleted.push(ItemIdentifier::from(id));
                continue;
            };
            let parent = match container {
                ItemIdentifier::WorkingSet => {
                    match self.resolver.resolve_parent_identifier(ctx, &record).await? {
                        Some(parent) => parent,
                        None => continue,
                    }
                }
                other => other.clone(),
            };
            batch.updated.push(self.view(&record, parent).await?);
        }

        Ok(batch)
    }

    /// Builds the presentation view of one record
    pub async fn view(&self, record: &ItemRecord, parent: ItemIdentifier) -> Result<ItemView> {
        let entry = self.repository.get_cache_entry(record.id()).await?;
        let annotation = self.repository.get_annotation(record.id()).await?;
        Ok(ItemView::build(
            record,
            parent,
            entry.as_ref(),
            annotation.as_ref(),
        ))
    }
}

fn sort_for_listing(records: &mut [ItemRecord]) {
    records.sort_by(|a, b| {
        b.is_directory()
            .cmp(&a.is_directory())
            .then_with(|| a.name().cmp(b.name()))
    });
}
