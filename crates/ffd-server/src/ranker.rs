//! Proximity ranking on top of the record store.
//!
//! [`ProximityRanker`] moves the synchronous store call onto the blocking
//! pool, bounds it with the configured deadline, and reduces each record
//! to the summary sent back to the requester.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use ffd_store::{RecordStore, StoreError};
use ffd_types::{LocationSummary, ProximityQuery};
use tokio::time::timeout;

/// Most entries returned for one query.
pub const MAX_RESULTS: usize = 5;

/// Ranks store records for proximity queries.
#[derive(Clone)]
pub struct ProximityRanker {
    store: Arc<dyn RecordStore>,
    query_timeout: Duration,
}

impl std::fmt::Debug for ProximityRanker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProximityRanker")
            .field("query_timeout", &self.query_timeout)
            .finish_non_exhaustive()
    }
}

impl ProximityRanker {
    /// Create a ranker over `store` with a per-query deadline.
    pub const fn new(store: Arc<dyn RecordStore>, query_timeout: Duration) -> Self {
        Self {
            store,
            query_timeout,
        }
    }

    /// The nearest eligible giveaways for `query` as of `today`, at most
    /// [`MAX_RESULTS`] of them. An empty result is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the store misses the deadline,
    /// [`StoreError::Unavailable`] if the query task dies, or whatever
    /// error the store itself reports.
    pub async fn rank(
        &self,
        query: ProximityQuery,
        today: NaiveDate,
    ) -> Result<Vec<LocationSummary>, StoreError> {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || {
            store.query_nearest(query.filter, query.origin, today, MAX_RESULTS)
        });

        let records = match timeout(self.query_timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => {
                return Err(StoreError::Unavailable(format!(
                    "query task failed: {join_error}"
                )));
            }
            Err(_elapsed) => return Err(StoreError::Timeout),
        };

        Ok(records
            .into_iter()
            .take(MAX_RESULTS)
            .map(LocationSummary::from)
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ffd_store::MemoryStore;
    use ffd_types::{Category, CategoryFilter, Coordinates, GeoRecord, RecordId};

    use super::*;

    struct SlowStore;

    impl RecordStore for SlowStore {
        fn query_nearest(
            &self,
            _filter: CategoryFilter,
            _origin: Coordinates,
            _as_of: NaiveDate,
            _limit: usize,
        ) -> Result<Vec<GeoRecord>, StoreError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(Vec::new())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn seeded(count: u32) -> Arc<dyn RecordStore> {
        let records = (1..=count)
            .map(|i| GeoRecord {
                id: RecordId(i),
                name: format!("point {i}"),
                description: String::new(),
                lat: 10.0 + f64::from(i) / 100.0,
                lng: 10.0,
                category: Category::All,
                start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            })
            .collect();
        Arc::new(MemoryStore::from_records(records).unwrap())
    }

    fn query() -> ProximityQuery {
        ProximityQuery {
            filter: CategoryFilter::Foodbank,
            origin: Coordinates::new(10.0, 10.0),
        }
    }

    #[tokio::test]
    async fn caps_results_at_five() {
        let ranker = ProximityRanker::new(seeded(9), Duration::from_secs(1));
        let ranked = ranker.rank(query(), today()).await.unwrap();
        let ids: Vec<_> = ranked.iter().map(|s| s.id.into_inner()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn empty_store_is_empty_result() {
        let ranker = ProximityRanker::new(seeded(0), Duration::from_secs(1));
        assert!(ranker.rank(query(), today()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let ranker = ProximityRanker::new(Arc::new(SlowStore), Duration::from_millis(20));
        let err = ranker.rank(query(), today()).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout));
    }
}
