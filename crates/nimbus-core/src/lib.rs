//! Nimbus Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `ItemRecord`, `LocalCacheEntry`, `Annotation`, `ItemView`
//! - **State machine** - per-item transfer lifecycle (`ItemStatus`)
//! - **Use cases** - `IdentifierResolver`
//! - **Port definitions** - Traits for adapters: `IStateRepository`, `IRemoteTransport`
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external dependencies.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
