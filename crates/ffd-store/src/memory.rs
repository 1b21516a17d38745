//! In-memory record store.
//!
//! [`MemoryStore`] keeps every record in a [`BTreeMap`] behind a read-write
//! lock. Queries take the read side only, so any number of workers can
//! rank concurrently. Records are loaded once at startup from a YAML seed
//! file of the form:
//!
//! ```yaml
//! records:
//!   - id: 1
//!     name: "Harbour Pantry"
//!     description: "Tinned goods and bread"
//!     lat: 28.1416
//!     lng: -15.4301
//!     category: foodbank
//!     start: 2026-10-01
//!     end: 2026-10-31
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use chrono::NaiveDate;
use ffd_types::{CategoryFilter, Coordinates, GeoRecord, RecordId};
use serde::Deserialize;
use tracing::debug;

use crate::error::StoreError;
use crate::ranking::rank_nearest;
use crate::store::RecordStore;

/// Longest display name accepted, in characters.
pub const MAX_NAME_CHARS: usize = 20;

/// Longest description accepted, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 40;

/// Top-level layout of a seed file.
#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    records: Vec<GeoRecord>,
}

/// A thread-safe, in-process [`RecordStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<RecordId, GeoRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a list of records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRecord`] if any record fails validation
    /// or two records share an id.
    pub fn from_records(records: Vec<GeoRecord>) -> Result<Self, StoreError> {
        let store = Self::new();
        for record in records {
            store.insert(record)?;
        }
        Ok(store)
    }

    /// Parse a YAML seed document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Yaml`] if the document is malformed, or
    /// [`StoreError::InvalidRecord`] if a record fails validation.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, StoreError> {
        let seed: SeedFile = serde_yml::from_str(yaml)?;
        Self::from_records(seed.records)
    }

    /// Load a YAML seed file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be read, otherwise as
    /// [`from_yaml_str`](Self::from_yaml_str).
    pub fn from_yaml_file(path: &Path) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path)?;
        let store = Self::from_yaml_str(&contents)?;
        debug!(path = %path.display(), records = store.len(), "records loaded");
        Ok(store)
    }

    /// Add a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRecord`] if the record fails validation
    /// or its id is already taken.
    pub fn insert(&self, record: GeoRecord) -> Result<(), StoreError> {
        validate_record(&record)?;
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records.entry(record.id) {
            Entry::Occupied(_) => Err(StoreError::InvalidRecord(format!(
                "duplicate record id {}",
                record.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryStore {
    fn query_nearest(
        &self,
        filter: CategoryFilter,
        origin: Coordinates,
        as_of: NaiveDate,
        limit: usize,
    ) -> Result<Vec<GeoRecord>, StoreError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rank_nearest(records.values(), filter, origin, as_of, limit))
    }
}

fn validate_record(record: &GeoRecord) -> Result<(), StoreError> {
    let name_chars = record.name.chars().count();
    if name_chars == 0 || name_chars > MAX_NAME_CHARS {
        return Err(StoreError::InvalidRecord(format!(
            "record {}: name must be 1-{MAX_NAME_CHARS} characters",
            record.id
        )));
    }
    if record.description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(StoreError::InvalidRecord(format!(
            "record {}: description exceeds {MAX_DESCRIPTION_CHARS} characters",
            record.id
        )));
    }
    if !record.coordinates().is_valid() {
        return Err(StoreError::InvalidRecord(format!(
            "record {}: coordinates out of range",
            record.id
        )));
    }
    if !record.window().is_well_formed() {
        return Err(StoreError::InvalidRecord(format!(
            "record {}: start date is after end date",
            record.id
        )));
    }
    Ok(())
}
