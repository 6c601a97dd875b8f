//! Domain entities and business logic
//!
//! This module contains the core domain types for Nimbus:
//! - Newtypes for identifiers, remote paths and version tokens
//! - Item records and their transfer state machine
//! - Local cache entries and annotations
//! - The presentation view handed to the host surface
//! - Domain-specific error types

pub mod annotation;
pub mod cache_entry;
pub mod context;
pub mod errors;
pub mod item;
pub mod item_view;
pub mod newtypes;
pub mod transfer;

// Re-export commonly used types
pub use annotation::Annotation;
pub use cache_entry::LocalCacheEntry;
pub use context::AccountContext;
pub use errors::DomainError;
pub use item::{ErrorInfo, ItemRecord, ItemStatus};
pub use item_view::ItemView;
pub use newtypes::*;
pub use transfer::{TransferKind, TransferOperation};
