//! Time ranges and their partition into fixed-size slices

use crate::record::TIMESTAMP_FORMAT;
use chrono::{DateTime, TimeDelta, Utc};
use eyre::Result;
use std::fmt;

/// Half-open UTC interval `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    pub fn duration(&self) -> TimeDelta {
        self.to - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.from >= self.to
    }

    /// Split the range into consecutive slices of `interval`
    ///
    /// Every internal boundary is shared by two neighbouring slices and the
    /// last slice is clipped so it ends exactly at `to`. An empty range
    /// yields no slices.
    ///
    /// # Errors
    /// Returns an error if `interval` is zero or negative.
    ///
    /// # Example
    /// ```
    /// use chrono::{TimeDelta, TimeZone, Utc};
    /// use mds_extract::scheduler::TimeRange;
    ///
    /// let from = Utc.with_ymd_and_hms(2015, 4, 16, 0, 0, 0).unwrap();
    /// let range = TimeRange::new(from, from + TimeDelta::minutes(40));
    /// let slices = range.slices(TimeDelta::minutes(15)).unwrap();
    ///
    /// assert_eq!(slices.len(), 3);
    /// assert_eq!(slices[2].duration(), TimeDelta::minutes(10));
    /// ```
    pub fn slices(&self, interval: TimeDelta) -> Result<Vec<TimeRange>> {
        if interval <= TimeDelta::zero() {
            eyre::bail!("Slice interval must be positive, got {}", interval);
        }

        let mut slices = Vec::new();
        let mut current = self.from;
        while current < self.to {
            let end = current
                .checked_add_signed(interval)
                .map_or(self.to, |end| end.min(self.to));
            slices.push(TimeRange::new(current, end));
            current = end;
        }
        Ok(slices)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.from.format(TIMESTAMP_FORMAT),
            self.to.format(TIMESTAMP_FORMAT)
        )
    }
}
