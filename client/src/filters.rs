//! In-memory refinement of a listing result set.

use domain::{Listing, ListingType};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} filter '{value}'")]
pub struct FilterParseError {
    kind: &'static str,
    value: String,
}

/// Price ranges offered by the search page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBucket {
    /// `price < 500_000`
    Under500k,
    /// `500_000 <= price <= 1_000_000`
    Between500kAnd1m,
    /// `price > 1_000_000`
    Above1m,
}

impl PriceBucket {
    pub fn contains(self, price: i64) -> bool {
        match self {
            PriceBucket::Under500k => price < 500_000,
            PriceBucket::Between500kAnd1m => (500_000..=1_000_000).contains(&price),
            PriceBucket::Above1m => price > 1_000_000,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            PriceBucket::Under500k => "under-500k",
            PriceBucket::Between500kAnd1m => "500k-1m",
            PriceBucket::Above1m => "above-1m",
        }
    }
}

impl FromStr for PriceBucket {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "under-500k" => Ok(PriceBucket::Under500k),
            "500k-1m" => Ok(PriceBucket::Between500kAnd1m),
            "above-1m" => Ok(PriceBucket::Above1m),
            other => Err(FilterParseError {
                kind: "price",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PriceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum-count filter applied to `owners`. A listing without a count counts as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountThreshold {
    /// Exactly zero (shown as "Studio").
    None,
    AtLeast(u8),
}

impl CountThreshold {
    pub fn matches(self, count: Option<i64>) -> bool {
        let count = count.unwrap_or(0);
        match self {
            CountThreshold::None => count == 0,
            CountThreshold::AtLeast(min) => count >= i64::from(min),
        }
    }
}

impl FromStr for CountThreshold {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "studio" => Ok(CountThreshold::None),
            "1+" => Ok(CountThreshold::AtLeast(1)),
            "2+" => Ok(CountThreshold::AtLeast(2)),
            "3+" => Ok(CountThreshold::AtLeast(3)),
            "4+" => Ok(CountThreshold::AtLeast(4)),
            other => Err(FilterParseError {
                kind: "count",
                value: other.to_string(),
            }),
        }
    }
}

/// Filters chosen on the search page. Every set filter must hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingFilters {
    pub listing_type: Option<ListingType>,
    pub price: Option<PriceBucket>,
    pub owners: Option<CountThreshold>,
}

impl ListingFilters {
    /// Builds filters from the raw select values; empty strings mean "any".
    pub fn from_selection(
        listing_type: &str,
        price: &str,
        owners: &str,
    ) -> Result<Self, FilterParseError> {
        let listing_type = match listing_type {
            "" => None,
            raw => Some(ListingType::parse(raw).ok_or_else(|| FilterParseError {
                kind: "type",
                value: raw.to_string(),
            })?),
        };
        Ok(Self {
            listing_type,
            price: (!price.is_empty()).then(|| price.parse()).transpose()?,
            owners: (!owners.is_empty()).then(|| owners.parse()).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        self.listing_type.is_none_or(|t| listing.listing_type == t)
            && self.price.is_none_or(|bucket| bucket.contains(listing.price))
            && self.owners.is_none_or(|threshold| threshold.matches(listing.owners))
    }
}

/// Keeps the listings every filter accepts, in their original order.
pub fn apply_local_filters(listings: &[Listing], filters: &ListingFilters) -> Vec<Listing> {
    listings
        .iter()
        .filter(|listing| filters.matches(listing))
        .cloned()
        .collect()
}
