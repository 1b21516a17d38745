//! Eligibility filtering and nearest-first ordering.
//!
//! Shared by every [`RecordStore`](crate::RecordStore) implementation that
//! ranks in-process. The rules are:
//!
//! 1. A record is eligible when its category matches the filter (or is the
//!    wildcard `all`) and its validity window covers the reference date.
//! 2. Eligible records are ordered by great-circle distance from the origin.
//! 3. Equal distances are ordered by ascending record id, so results are
//!    deterministic.

use std::cmp::Ordering;

use chrono::NaiveDate;
use ffd_types::{CategoryFilter, Coordinates, GeoRecord};

use crate::geo::distance_km;

/// Rank `records` for a query and keep the first `limit`.
pub fn rank_nearest<'a, I>(
    records: I,
    filter: CategoryFilter,
    origin: Coordinates,
    as_of: NaiveDate,
    limit: usize,
) -> Vec<GeoRecord>
where
    I: IntoIterator<Item = &'a GeoRecord>,
{
    let mut scored: Vec<(f64, &GeoRecord)> = records
        .into_iter()
        .filter(|record| record.is_eligible(filter, as_of))
        .map(|record| (distance_km(origin, record.coordinates()), record))
        .collect();

    scored.sort_by(|(dist_a, a), (dist_b, b)| compare_ranked(*dist_a, a, *dist_b, b));
    scored.truncate(limit);

    scored.into_iter().map(|(_, record)| record.clone()).collect()
}

fn compare_ranked(dist_a: f64, a: &GeoRecord, dist_b: f64, b: &GeoRecord) -> Ordering {
    dist_a.total_cmp(&dist_b).then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ffd_types::{Category, RecordId};

    use super::*;

    /// Kilometres per degree of latitude on the mean-radius sphere.
    const KM_PER_DEGREE: f64 = 111.194_93;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn record_north_of(origin: Coordinates, id: u32, km: f64, category: Category) -> GeoRecord {
        GeoRecord {
            id: RecordId(id),
            name: format!("giveaway-{id}"),
            description: String::new(),
            lat: origin.lat + km / KM_PER_DEGREE,
            lng: origin.lng,
            category,
            start: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 10, 31).unwrap(),
        }
    }

    #[test]
    fn nearer_record_ranks_first() {
        let origin = Coordinates::new(28.1, -15.42);
        let far = record_north_of(origin, 1, 7.0, Category::Foodbank);
        let near = record_north_of(origin, 2, 3.0, Category::Foodbank);

        let ranked = rank_nearest([&far, &near], CategoryFilter::Foodbank, origin, today(), 5);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, RecordId(2));
        assert_eq!(ranked[1].id, RecordId(1));
        let near_km = distance_km(origin, ranked[0].coordinates());
        assert!((near_km - 3.0).abs() < 0.01, "got {near_km}");
    }

    #[test]
    fn ties_break_on_record_id() {
        let origin = Coordinates::new(10.0, 10.0);
        let b = record_north_of(origin, 9, 2.0, Category::People);
        let a = record_north_of(origin, 4, 2.0, Category::People);

        let ranked = rank_nearest([&b, &a], CategoryFilter::People, origin, today(), 5);
        let ids: Vec<_> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RecordId(4), RecordId(9)]);
    }

    #[test]
    fn filters_category_and_window() {
        let origin = Coordinates::new(10.0, 10.0);
        let foodbank = record_north_of(origin, 1, 1.0, Category::Foodbank);
        let people = record_north_of(origin, 2, 1.0, Category::People);
        let wildcard = record_north_of(origin, 3, 5.0, Category::All);
        let mut expired = record_north_of(origin, 4, 0.5, Category::Foodbank);
        expired.end = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let mut future = record_north_of(origin, 5, 0.5, Category::Foodbank);
        future.start = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        let all = [&foodbank, &people, &wildcard, &expired, &future];
        let ranked = rank_nearest(all, CategoryFilter::Foodbank, origin, today(), 5);
        let ids: Vec<_> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RecordId(1), RecordId(3)]);

        let ranked = rank_nearest(all, CategoryFilter::Any, origin, today(), 5);
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn keeps_only_limit() {
        let origin = Coordinates::new(-33.9, 18.4);
        let records: Vec<_> = (1..=8)
            .map(|i| record_north_of(origin, i, f64::from(i), Category::All))
            .collect();

        let ranked = rank_nearest(&records, CategoryFilter::People, origin, today(), 5);
        let ids: Vec<_> = ranked.iter().map(|r| r.id.into_inner()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn empty_input_is_empty_output() {
        let ranked = rank_nearest(
            std::iter::empty(),
            CategoryFilter::Any,
            Coordinates::new(1.0, 1.0),
            today(),
            5,
        );
        assert!(ranked.is_empty());
    }
}
