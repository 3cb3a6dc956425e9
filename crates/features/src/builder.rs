//! Feature vector construction.

use chrono::{DateTime, Datelike, FixedOffset, Utc, Weekday};

use larder_models::ItemDescriptor;

/// Width of the feature vector. Compile-time constant of the core.
pub const FEATURE_DIM: usize = 8;

/// Feature names, index-aligned with the vector produced by
/// [`FeatureBuilder::build`].
pub const FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "dow",
    "dom",
    "moy",
    "weekend",
    "household",
    "perishable",
    "days_to_expiry",
    "reserved",
];

/// Builds feature vectors for a fixed timezone.
///
/// | idx | name | definition |
/// |-----|------|------------|
/// | 0 | dow | day_of_week / 6 |
/// | 1 | dom | (day_of_month - 1) / 30 |
/// | 2 | moy | (month - 1) / 11 |
/// | 3 | weekend | 1 if Sat/Sun |
/// | 4 | household | min(size, 10) / 10 |
/// | 5 | perishable | 0 or 1 |
/// | 6 | days_to_expiry | clamp(days, 0, 30) / 30, 0 if absent |
/// | 7 | reserved | 0 |
#[derive(Debug, Clone, Copy)]
pub struct FeatureBuilder {
    timezone: FixedOffset,
}

impl FeatureBuilder {
    /// Creates a builder that resolves civil dates in `timezone`.
    pub fn new(timezone: FixedOffset) -> Self {
        Self { timezone }
    }

    /// Creates a builder pinned to UTC.
    pub fn utc() -> Self {
        Self {
            timezone: FixedOffset::east_opt(0).expect("zero offset is always valid"),
        }
    }

    /// Returns the timezone used for date resolution.
    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    /// Builds the feature vector for one timestamp and descriptor.
    pub fn build(&self, timestamp: DateTime<Utc>, descriptor: &ItemDescriptor) -> [f64; FEATURE_DIM] {
        let local = timestamp.with_timezone(&self.timezone);
        let weekday = local.weekday();
        let dow = weekday.num_days_from_monday() as f64;
        let weekend = matches!(weekday, Weekday::Sat | Weekday::Sun);

        let days_to_expiry = match descriptor.expiry_date() {
            Some(expiry) => {
                let days = (expiry - local.date_naive()).num_days();
                days.clamp(0, 30) as f64 / 30.0
            }
            None => 0.0,
        };

        [
            dow / 6.0,
            (local.day() as f64 - 1.0) / 30.0,
            (local.month() as f64 - 1.0) / 11.0,
            if weekend { 1.0 } else { 0.0 },
            (descriptor.household_size().min(10)) as f64 / 10.0,
            if descriptor.perishable() { 1.0 } else { 0.0 },
            days_to_expiry,
            0.0,
        ]
    }
}
