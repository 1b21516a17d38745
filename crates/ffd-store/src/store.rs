//! The read interface the server consumes.

use chrono::NaiveDate;
use ffd_types::{CategoryFilter, Coordinates, GeoRecord};

use crate::error::StoreError;

/// A source of geotagged giveaway records.
///
/// Implementations own their schema, persistence, and any connection
/// pooling, and must be safe to query from many workers at once. Calls are
/// synchronous; the server moves them onto the blocking pool and bounds
/// them with a deadline.
pub trait RecordStore: Send + Sync {
    /// Return at most `limit` records eligible under `filter` on `as_of`,
    /// nearest to `origin` first, ties broken by ascending record id.
    fn query_nearest(
        &self,
        filter: CategoryFilter,
        origin: Coordinates,
        as_of: NaiveDate,
        limit: usize,
    ) -> Result<Vec<GeoRecord>, StoreError>;
}
