//! Quantized sampling grid over a date span.
//!
//! Prices are sampled once per interval. The interval is a whole number of
//! 30-day months and both ends sit on multiples of the interval counted from
//! 1970-01-01, so two ranges with the same interval share sample dates.

use std::fmt;

use chrono::{Duration, NaiveDate};

use crate::domain::error::PortoptError;

pub const MIN_INTERVAL_DAYS: i64 = 30;
/// Ten years of 30-day months.
pub const MAX_INTERVAL_DAYS: i64 = 120 * MIN_INTERVAL_DAYS;

/// Rounds to the nearest multiple of [`MIN_INTERVAL_DAYS`], half up, within
/// `MIN_INTERVAL_DAYS..=MAX_INTERVAL_DAYS`.
pub fn round_interval(days: i64) -> i64 {
    if days <= MIN_INTERVAL_DAYS {
        return MIN_INTERVAL_DAYS;
    }
    if days >= MAX_INTERVAL_DAYS {
        return MAX_INTERVAL_DAYS;
    }
    let rem = days % MIN_INTERVAL_DAYS;
    if rem < MIN_INTERVAL_DAYS / 2 {
        days - rem
    } else {
        days - rem + MIN_INTERVAL_DAYS
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn quantize(date: NaiveDate, interval_days: i64) -> NaiveDate {
    let days = (date - epoch()).num_days();
    epoch()
        .checked_add_signed(Duration::days(days.div_euclid(interval_days) * interval_days))
        .unwrap_or(date)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
    interval_days: i64,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate, desired_interval_days: i64) -> Self {
        let interval_days = round_interval(desired_interval_days);
        Self {
            start: quantize(start, interval_days),
            end: quantize(end, interval_days),
            interval_days,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn interval_days(&self) -> i64 {
        self.interval_days
    }

    /// Last day covered by the final sample. Saturates at `NaiveDate::MAX`.
    pub fn last_day(&self) -> NaiveDate {
        self.end
            .checked_add_signed(Duration::days(self.interval_days - 1))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// True when `self` lies within `other`.
    pub fn is_inside(&self, other: &DateRange) -> bool {
        self.start >= other.start && self.end <= other.end
    }

    pub fn intersect(&self, other: &DateRange) -> Result<DateRange, PortoptError> {
        if self.interval_days != other.interval_days {
            return Err(PortoptError::IntervalMismatch {
                left: self.interval_days,
                right: other.interval_days,
            });
        }
        Ok(DateRange {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
            interval_days: self.interval_days,
        })
    }

    /// Sample dates from start to end inclusive.
    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        let step = Duration::days(self.interval_days);
        std::iter::successors(Some(self.start), move |d| d.checked_add_signed(step))
            .take_while(move |d| *d <= end)
    }

    pub fn sample_count(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        ((self.end - self.start).num_days() / self.interval_days) as usize + 1
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, every {} days]",
            self.start, self.end, self.interval_days
        )
    }
}
