//! Core entity structs shared by the store and the server.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::enums::{Category, CategoryFilter};
use crate::ids::RecordId;

/// A point on the Earth's surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    pub lng: f64,
}

impl Coordinates {
    /// Create a coordinate pair.
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both components are finite and inside the WGS84 ranges
    /// (`|lat| <= 90`, `|lng| <= 180`).
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// The dates between which a giveaway is on offer.
///
/// Both bounds are inclusive: a giveaway is active on its first and on its
/// last day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    /// First day the giveaway is active.
    pub start: NaiveDate,
    /// Last day the giveaway is active.
    pub end: NaiveDate,
}

impl ValidityWindow {
    /// Whether `start` does not come after `end`.
    pub fn is_well_formed(&self) -> bool {
        self.start <= self.end
    }

    /// Whether the window covers `date`.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A geotagged giveaway held by the record store.
///
/// Read-only to the server: workers only ever receive copies returned by a
/// store query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    /// Store-assigned identifier.
    pub id: RecordId,
    /// Display name (at most 20 characters in the canonical schema).
    pub name: String,
    /// Short free-form description.
    #[serde(default)]
    pub description: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Who offers the giveaway.
    pub category: Category,
    /// First day the giveaway is active.
    pub start: NaiveDate,
    /// Last day the giveaway is active.
    pub end: NaiveDate,
}

impl GeoRecord {
    /// The record's position.
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    /// The record's validity window.
    pub const fn window(&self) -> ValidityWindow {
        ValidityWindow {
            start: self.start,
            end: self.end,
        }
    }

    /// Whether this record may be returned for `filter` on `today`.
    pub fn is_eligible(&self, filter: CategoryFilter, today: NaiveDate) -> bool {
        filter.matches(self.category) && self.window().is_active_on(today)
    }
}

/// A validated proximity query.
///
/// Only constructed by the request parser once every field has been checked,
/// so holders never need to re-validate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityQuery {
    /// Which categories of giveaway to include.
    pub filter: CategoryFilter,
    /// Where the requester is.
    pub origin: Coordinates,
}

/// One entry of a proximity result, as sent back to the requester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSummary {
    /// Record identifier.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Short description.
    #[serde(rename = "desc")]
    pub description: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Last day the giveaway is active.
    pub end: NaiveDate,
}

impl From<GeoRecord> for LocationSummary {
    fn from(record: GeoRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
            lat: record.lat,
            lng: record.lng,
            end: record.end,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(category: Category) -> GeoRecord {
        GeoRecord {
            id: RecordId(1),
            name: String::from("Harbour Pantry"),
            description: String::from("Tinned goods"),
            lat: 51.5,
            lng: -0.12,
            category,
            start: date(2026, 3, 1),
            end: date(2026, 3, 31),
        }
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let window = record(Category::All).window();
        assert!(window.is_active_on(date(2026, 3, 1)));
        assert!(window.is_active_on(date(2026, 3, 15)));
        assert!(window.is_active_on(date(2026, 3, 31)));
        assert!(!window.is_active_on(date(2026, 2, 28)));
        assert!(!window.is_active_on(date(2026, 4, 1)));
    }

    #[test]
    fn inverted_window_is_not_well_formed() {
        let window = ValidityWindow {
            start: date(2026, 5, 2),
            end: date(2026, 5, 1),
        };
        assert!(!window.is_well_formed());
    }

    #[test]
    fn eligibility_combines_category_and_window() {
        let today = date(2026, 3, 10);
        assert!(record(Category::Foodbank).is_eligible(CategoryFilter::Foodbank, today));
        assert!(!record(Category::People).is_eligible(CategoryFilter::Foodbank, today));
        assert!(record(Category::All).is_eligible(CategoryFilter::People, today));
        assert!(!record(Category::All).is_eligible(CategoryFilter::Any, date(2026, 6, 1)));
    }

    #[test]
    fn coordinate_ranges() {
        assert!(Coordinates::new(90.0, 180.0).is_valid());
        assert!(!Coordinates::new(90.5, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -180.5).is_valid());
        assert!(!Coordinates::new(f64::NAN, 1.0).is_valid());
    }

    #[test]
    fn summary_uses_short_description_key() {
        let summary = LocationSummary::from(record(Category::Foodbank));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["desc"], "Tinned goods");
        assert_eq!(json["end"], "2026-03-31");
        assert_eq!(json["id"], 1);
    }
}
