// Price catalog and day-count rules. Every module that needs a total goes
// through here; nothing else re-derives billable days or subtotals.

use chrono::{DateTime, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Upper bound per size accepted from a booking request
pub const MAX_BAGS_PER_SIZE: u32 = 50;

/// Bag sizes offered at the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum BagSize {
    Small,
    Medium,
    Large,
}

impl BagSize {
    pub const ALL: [BagSize; 3] = [BagSize::Small, BagSize::Medium, BagSize::Large];

    /// EUR per bag per day
    pub fn rate_per_day(self) -> Decimal {
        match self {
            BagSize::Small => dec!(5),
            BagSize::Medium => dec!(6),
            BagSize::Large => dec!(7),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BagSize::Small => "Small",
            BagSize::Medium => "Medium",
            BagSize::Large => "Large",
        }
    }
}

impl std::fmt::Display for BagSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-size bag counts; missing keys deserialize to zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct BagQuantities {
    #[serde(default)]
    pub small: u32,
    #[serde(default)]
    pub medium: u32,
    #[serde(default)]
    pub large: u32,
}

impl BagQuantities {
    pub fn new(small: u32, medium: u32, large: u32) -> Self {
        Self {
            small,
            medium,
            large,
        }
    }

    pub fn count(&self, size: BagSize) -> u32 {
        match size {
            BagSize::Small => self.small,
            BagSize::Medium => self.medium,
            BagSize::Large => self.large,
        }
    }

    pub fn total_bags(&self) -> u32 {
        self.small + self.medium + self.large
    }

    /// (size, count) pairs in catalog order
    pub fn iter(&self) -> impl Iterator<Item = (BagSize, u32)> + '_ {
        BagSize::ALL.into_iter().map(|size| (size, self.count(size)))
    }
}

/// Priced storage period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub billable_days: i64,
    pub per_day_subtotal: Decimal,
    pub total_price: Decimal,
}

/// Inclusive calendar-day count for a storage period.
///
/// Same-day drop-off and pick-up counts as one day; each further calendar
/// day adds one. Unparseable input or a pick-up before the drop-off yields
/// zero, which callers treat as "not bookable" rather than an error.
pub fn billable_days(drop_off: &str, pick_up: &str) -> i64 {
    let (start, end) = match (parse_day(drop_off), parse_day(pick_up)) {
        (Some(start), Some(end)) => (start, end),
        _ => return 0,
    };
    if end < start {
        return 0;
    }
    (end - start).num_days() + 1
}

// Dates arrive as plain YYYY-MM-DD from the booking form, but stored
// metadata may carry full RFC 3339 timestamps; both normalize to the
// calendar day, time of day never affects billing.
fn parse_day(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.date_naive())
}

/// One day of storage for every requested bag
pub fn per_day_subtotal(quantities: &BagQuantities) -> Decimal {
    quantities
        .iter()
        .map(|(size, count)| size.rate_per_day() * Decimal::from(count))
        .sum()
}

/// Full quote for a storage period
pub fn quote(drop_off: &str, pick_up: &str, quantities: &BagQuantities) -> Quote {
    let days = billable_days(drop_off, pick_up);
    let per_day = per_day_subtotal(quantities);
    Quote {
        billable_days: days,
        per_day_subtotal: per_day,
        total_price: per_day * Decimal::from(days),
    }
}

/// EUR major units to integer minor units (cents), midpoint away from zero
pub fn eur_to_minor(amount: Decimal) -> i64 {
    (amount * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
        .max(0)
}

/// Integer minor units (cents) back to EUR major units
pub fn minor_to_eur(minor: i64) -> Decimal {
    Decimal::from(minor) / Decimal::from(100)
}
