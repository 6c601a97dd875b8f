//! Use cases (interactors) for Nimbus
//!
//! This module contains the application use cases that orchestrate
//! domain entities and port interfaces.
//!
//! ## Use Cases
//!
//! - [`IdentifierResolver`] - Identifier to record mapping and parent resolution

pub mod identifier_resolver;

pub use identifier_resolver::IdentifierResolver;
