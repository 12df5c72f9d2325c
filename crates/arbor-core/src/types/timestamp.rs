//! Absolute timestamps in unix seconds.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds in one day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Seconds in a 365-day year, the basis for time-to-maturity fractions.
pub const SECONDS_PER_YEAR: i64 = 365 * SECONDS_PER_DAY;

/// An absolute point in time, in whole seconds since the unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The unix epoch.
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Creates a timestamp from unix seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Returns the unix seconds.
    #[must_use]
    pub const fn as_secs(self) -> i64 {
        self.0
    }

    /// Converts a chrono UTC datetime.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    /// Converts to a chrono UTC datetime, if representable.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.0, 0)
    }

    /// Returns this timestamp shifted by `secs` seconds (saturating).
    #[must_use]
    pub const fn plus_secs(self, secs: i64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Returns this timestamp shifted by whole days (saturating).
    #[must_use]
    pub const fn plus_days(self, days: i64) -> Self {
        self.plus_secs(days.saturating_mul(SECONDS_PER_DAY))
    }

    /// Seconds from `self` until `later`, clamped at zero.
    #[must_use]
    pub const fn seconds_until(self, later: Timestamp) -> i64 {
        let diff = later.0.saturating_sub(self.0);
        if diff > 0 {
            diff
        } else {
            0
        }
    }

    /// Year fraction from `self` until `later` on a 365-day basis, clamped at zero.
    #[must_use]
    pub fn years_until(self, later: Timestamp) -> Decimal {
        Decimal::from(self.seconds_until(later)) / Decimal::from(SECONDS_PER_YEAR)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ")),
            None => write!(f, "{}s", self.0),
        }
    }
}

impl From<i64> for Timestamp {
    fn from(secs: i64) -> Self {
        Self(secs)
    }
}
