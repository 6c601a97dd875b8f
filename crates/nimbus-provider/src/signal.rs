//! Change signaling between the engine and enumeration observers.
//!
//! Every mutation of an item record or cache entry enqueues a change keyed
//! by item for the item's parent container and for the working set, then
//! triggers re-enumeration of both. Pending changes are collapsed per item:
//! only the latest change survives until the next enumeration reads it.
//! Reading with an anchor acknowledges everything up to it, and those
//! changes are dropped; an older anchor is reported as expired.
//!
//! ```text
//! ┌──────────────────┐  enqueue(container, id)  ┌─────────────────┐
//! │ CompletionQueue  │ ───────────────────────► │   SignalBus     │
//! └──────────────────┘                          │ pending: DashMap│
//!                                               │ seq: AtomicU64  │
//! ┌──────────────────┐  changes_since(anchor)   │                 │
//! │   Enumerator     │ ◄─────────────────────── │ trigger: bcast  │
//! └──────────────────┘                          └─────────────────┘
//! ```

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use dashmap::DashMap;
use nimbus_core::domain::{ItemId, ItemIdentifier};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the re-enumeration trigger channel
const TRIGGER_CAPACITY: usize = 64;

/// Kind of pending change for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Updated,
    Deleted,
}

/// Enumeration checkpoint: the highest change sequence observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SyncAnchor(pub u64);

impl fmt::Display for SyncAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingChange {
    change: Change,
    seq: u64,
}

/// Unacknowledged changes of one container
#[derive(Debug, Default)]
struct ContainerQueue {
    changes: HashMap<ItemId, PendingChange>,
    /// Highest anchor a reader has passed back; older changes are gone
    acknowledged: u64,
}

impl ContainerQueue {
    fn acknowledge(&mut self, anchor: SyncAnchor) {
        if anchor.0 <= self.acknowledged {
            return;
        }
        self.acknowledged = anchor.0;
        self.changes.retain(|_, p| p.seq > anchor.0);
    }
}

/// Changes of one container newer than an anchor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Updated items, oldest change first
    pub updated: Vec<ItemId>,
    pub deleted: Vec<ItemId>,
    /// Anchor to pass to the next call
    pub anchor: SyncAnchor,
    /// The supplied anchor predates changes already dropped; the caller
    /// must enumerate the container again instead
    pub expired: bool,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Collects per-container changes and notifies observers
///
/// Cheap to clone; clones share the same queues.
#[derive(Clone)]
pub struct SignalBus {
    pending: Arc<DashMap<ItemIdentifier, ContainerQueue>>,
    seq: Arc<AtomicU64>,
    trigger: broadcast::Sender<ItemIdentifier>,
}

impl SignalBus {
    pub fn new() -> Self {
        let (trigger, _) = broadcast::channel(TRIGGER_CAPACITY);
        Self {
            pending: Arc::new(DashMap::new()),
            seq: Arc::new(AtomicU64::new(0)),
            trigger,
        }
    }

    /// Records a change of `id` for `container`, replacing any older one
    pub fn enqueue(&self, container: &ItemIdentifier, id: &ItemId, change: Change) {
        // The sequence is taken under the container's lock, so a reader that
        // saw the anchor also sees the change
        let mut queue = self.pending.entry(container.clone()).or_default();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        queue.changes.insert(id.clone(), PendingChange { change, seq });
        tracing::trace!(%container, item_id = %id, ?change, seq, "Change enqueued");
    }

    /// Asks observers of `container` to re-enumerate
    ///
    /// Having no observers is not an error.
    pub fn trigger(&self, container: &ItemIdentifier) {
        let _ = self.trigger.send(container.clone());
    }

    /// Enqueues `change` for the parent container (when known) and the
    /// working set, then triggers both
    pub fn signal(&self, id: &ItemId, parent: Option<&ItemIdentifier>, change: Change) {
        self.enqueue_for_observers(id, parent, change);
        self.trigger_observers(parent);
    }

    /// Enqueues for the parent container and the working set without
    /// triggering
    pub fn enqueue_for_observers(
        &self,
        id: &ItemId,
        parent: Option<&ItemIdentifier>,
        change: Change,
    ) {
        if let Some(parent) = parent {
            self.enqueue(parent, id, change);
        }
        self.enqueue(&ItemIdentifier::WorkingSet, id, change);
    }

    /// Triggers the parent container (when known) and the working set
    pub fn trigger_observers(&self, parent: Option<&ItemIdentifier>) {
        if let Some(parent) = parent {
            self.trigger(parent);
        }
        self.trigger(&ItemIdentifier::WorkingSet);
    }

    /// Receives the identifier of every container asked to re-enumerate
    ///
    /// A receiver that lags behind gets `RecvError::Lagged` and should
    /// simply re-enumerate what it observes.
    pub fn subscribe(&self) -> broadcast::Receiver<ItemIdentifier> {
        self.trigger.subscribe()
    }

    /// The anchor covering every change enqueued so far
    pub fn current_anchor(&self) -> SyncAnchor {
        SyncAnchor(self.seq.load(Ordering::SeqCst))
    }

    /// Changes of `container` enqueued after `anchor`
    ///
    /// Changes up to `anchor` are acknowledged and dropped from the queue.
    pub fn changes_since(&self, container: &ItemIdentifier, anchor: SyncAnchor) -> ChangeSet {
        let current = self.current_anchor();
        let mut set = ChangeSet {
            anchor: current,
            ..ChangeSet::default()
        };
        let Some(mut queue) = self.pending.get_mut(container) else {
            return set;
        };

        set.expired = anchor.0 < queue.acknowledged;
        queue.acknowledge(anchor);

        let mut newer: Vec<(&ItemId, &PendingChange)> = queue
            .changes
            .iter()
            .filter(|(_, p)| p.seq > anchor.0 && p.seq <= current.0)
            .collect();
        newer.sort_by_key(|(_, p)| p.seq);

        for (id, p) in newer {
            match p.change {
                Change::Updated => set.updated.push(id.clone()),
                Change::Deleted => set.deleted.push(id.clone()),
            }
        }
        set
    }

    #[cfg(test)]
    fn retained(&self, container: &ItemIdentifier) -> usize {
        self.pending
            .get(container)
            .map_or(0, |queue| queue.changes.len())
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBus")
            .field("containers", &self.pending.len())
            .field("seq", &self.seq.load(Ordering::SeqCst))
            .finish()
    }
}
