//! Shared type definitions for the FFD giveaway finder.
//!
//! This crate is the single source of truth for the types that flow between
//! the record store, the connection workers, and the daemon binary.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifiers for records and workers
//! - [`enums`] -- Record categories and query filters
//! - [`structs`] -- Coordinates, records, queries, and result entries

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Category, CategoryFilter};
pub use ids::{RecordId, WorkerId};
pub use structs::{Coordinates, GeoRecord, LocationSummary, ProximityQuery, ValidityWindow};
