//! Business-day calendar shared by every series in a run.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Ordered, gap-free weekday dates. Holidays are not removed here; the
/// market panel drops dates that carry no prices.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessCalendar {
    dates: Vec<NaiveDate>,
}

impl BusinessCalendar {
    /// Every Monday–Friday from `start` to `end` inclusive.
    pub fn weekdays(start: NaiveDate, end: NaiveDate) -> Self {
        let mut dates = Vec::new();
        let mut day = start;
        while day <= end {
            if is_weekday(day) {
                dates.push(day);
            }
            day += Duration::days(1);
        }
        Self { dates }
    }

    /// Wraps an already sorted, deduplicated date list.
    pub fn from_dates(mut dates: Vec<NaiveDate>) -> Self {
        dates.sort();
        dates.dedup();
        Self { dates }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Index of the first calendar date on or after `date`.
    pub fn snap_forward(&self, date: NaiveDate) -> Option<usize> {
        let idx = self.dates.partition_point(|d| *d < date);
        (idx < self.dates.len()).then_some(idx)
    }

    /// Index of the last calendar date on or before `date`.
    pub fn snap_backward(&self, date: NaiveDate) -> Option<usize> {
        let idx = self.dates.partition_point(|d| *d <= date);
        idx.checked_sub(1)
    }
}

pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Formats a date the way every exported table indexes rows.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
