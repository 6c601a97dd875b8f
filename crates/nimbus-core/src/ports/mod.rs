//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IStateRepository`] - Catalogue, cache tracker and annotation storage
//! - [`IRemoteTransport`] - Content download and upload against the server

pub mod state_repository;
pub mod transport;

pub use state_repository::{IStateRepository, RecordFilter};
pub use transport::{
    describe_status, IRemoteTransport, NoProgress, ProgressSink, TransportError,
    TransportErrorKind, TransportResponse,
};
