//! Enumeration types for giveaway records and proximity queries.

use serde::{Deserialize, Serialize};

/// Who a giveaway is offered by.
///
/// Stored on every record. A record tagged [`Category::All`] is offered to
/// every kind of requester and matches any [`CategoryFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Run by an organised food bank.
    Foodbank,
    /// Offered by private people.
    People,
    /// Applies to every category.
    All,
}

/// The category filter carried by a proximity query.
///
/// Parsed from the integer `type` query parameter: `1` selects food banks,
/// `2` selects private people, `3` selects everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFilter {
    /// Only food-bank records (plus records tagged [`Category::All`]).
    Foodbank,
    /// Only private-people records (plus records tagged [`Category::All`]).
    People,
    /// Every record regardless of category.
    Any,
}

impl CategoryFilter {
    /// Map the wire-level `type` selector onto a filter.
    ///
    /// Returns `None` for `0` (unset) and every other unknown selector.
    pub const fn from_selector(selector: i64) -> Option<Self> {
        match selector {
            1 => Some(Self::Foodbank),
            2 => Some(Self::People),
            3 => Some(Self::Any),
            _ => None,
        }
    }

    /// The wire-level selector for this filter.
    pub const fn selector(self) -> i64 {
        match self {
            Self::Foodbank => 1,
            Self::People => 2,
            Self::Any => 3,
        }
    }

    /// Whether a record of `category` is eligible under this filter.
    pub const fn matches(self, category: Category) -> bool {
        match (self, category) {
            (Self::Any, _)
            | (_, Category::All)
            | (Self::Foodbank, Category::Foodbank)
            | (Self::People, Category::People) => true,
            (Self::Foodbank, Category::People) | (Self::People, Category::Foodbank) => false,
        }
    }
}
