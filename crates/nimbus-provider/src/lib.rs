//! Nimbus Provider - on-demand synchronization engine
//!
//! Exposes a remote account as a set of lazily materialized items:
//! - Background downloads and uploads with progress and cancellation
//! - Serialized catalogue writes through a single completion queue
//! - Change signaling and container enumeration for observers
//! - Identity promotion of locally imported files after their first upload
//!
//! # Architecture
//!
//! The engine sits between the host surface and the adapters of the
//! hexagonal architecture:
//! - [`ProviderFacade`] maps lifecycle events onto the components below
//! - [`TransferEngine`] runs transfers, one per local path
//! - [`CompletionQueue`] is the only writer of records and cache entries
//! - [`SignalBus`] collects per-container changes and triggers observers
//! - [`Enumerator`] lists containers and the working set
//! - [`LocalStorage`] owns the `{root}/{identifier}/{name}` content layout
//!
//! # Usage
//!
//! ```ignore
//! use nimbus_provider::{LocalStorage, ProviderFacade};
//!
//! let storage = LocalStorage::new(config.storage.root.clone())?;
//! let facade = ProviderFacade::start(repository, transport, storage, 4);
//! let handle = facade.materialize(&ctx, &identifier).await?;
//! handle.wait().await.into_result()?;
//! ```

pub mod completion;
pub mod enumerator;
pub mod error;
pub mod facade;
pub mod signal;
pub mod storage;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use completion::{CompletionHandle, CompletionOp, CompletionQueue};
pub use enumerator::{ChangeBatch, Enumerator};
pub use error::ProviderError;
pub use facade::ProviderFacade;
pub use signal::{Change, ChangeSet, SignalBus, SyncAnchor};
pub use storage::LocalStorage;
pub use transfer::{TransferEngine, TransferHandle, TransferResult};
