//! Identifier resolution use case
//!
//! Maps opaque item identifiers to catalogue records and back, and derives
//! the container hierarchy from remote paths.
//!
//! The root container is a sentinel: it maps to a synthetic directory whose
//! container path is the account home path and is never looked up in the
//! catalogue. The working set is a pseudo-container, not a record, so it
//! never resolves to one.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::domain::{AccountContext, ItemIdentifier, ItemRecord};
use crate::ports::IStateRepository;

/// Use case for resolving identifiers against the catalogue
///
/// `Ok(None)` means "not found": the item is not enumerable yet and the
/// caller must not materialize it. `Err` is reserved for storage failures.
#[derive(Clone)]
pub struct IdentifierResolver {
    state_repository: Arc<dyn IStateRepository>,
}

impl IdentifierResolver {
    pub fn new(state_repository: Arc<dyn IStateRepository>) -> Self {
        Self { state_repository }
    }

    /// Resolves an identifier to its record
    pub async fn resolve_record(
        &self,
        ctx: &AccountContext,
        identifier: &ItemIdentifier,
    ) -> Result<Option<ItemRecord>> {
        match identifier {
            ItemIdentifier::Root => Ok(Some(ctx.root_record())),
            ItemIdentifier::WorkingSet => Ok(None),
            ItemIdentifier::Item(id) => self
                .state_repository
                .get_record(id)
                .await
                .with_context(|| format!("Failed to look up item {id}")),
        }
    }

    /// Resolves the identifier of the container holding `record`
    ///
    /// Walks the container path up one segment and matches it against the
    /// catalogue. The root's parent is the root itself. Returns `None` when
    /// the parent directory is not catalogued yet.
    pub async fn resolve_parent_identifier(
        &self,
        ctx: &AccountContext,
        record: &ItemRecord,
    ) -> Result<Option<ItemIdentifier>> {
        if record.is_root() {
            return Ok(Some(ItemIdentifier::Root));
        }

        let container = record.container_path();
        if let (Some(grand_parent), Some(name)) = (container.parent(), container.file_name()) {
            let parent = self
                .state_repository
                .find_child(&grand_parent, name)
                .await
                .with_context(|| format!("Failed to look up container {container}"))?;
            if let Some(parent) = parent {
                return Ok(Some(Self::identifier_for(&parent)));
            }
        }

        if container == ctx.home_path() {
            return Ok(Some(ItemIdentifier::Root));
        }

        tracing::debug!(
            item_id = %record.id(),
            container = %container,
            "Parent container is not catalogued"
        );
        Ok(None)
    }

    /// The identifier under which `record` is exposed
    pub fn identifier_for(record: &ItemRecord) -> ItemIdentifier {
        ItemIdentifier::from(record.id().clone())
    }
}
