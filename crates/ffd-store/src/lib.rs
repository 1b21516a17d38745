//! Record store for the FFD giveaway finder.
//!
//! The server treats the store as an external collaborator: it issues one
//! synchronous [`RecordStore::query_nearest`] call per request and never
//! writes. This crate provides that interface plus the reference
//! implementation used by the daemon.
//!
//! # Modules
//!
//! - [`store`] -- The [`RecordStore`] trait consumed by connection workers
//! - [`geo`] -- Great-circle distance on a spherical Earth
//! - [`ranking`] -- Eligibility filtering and nearest-first ordering
//! - [`memory`] -- In-memory store seeded from a YAML file
//! - [`error`] -- Shared error types

pub mod error;
pub mod geo;
pub mod memory;
pub mod ranking;
pub mod store;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::RecordStore;
