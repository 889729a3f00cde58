//! Compounding daily returns into calendar periods.

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

use super::frame::TimeSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Monday to Sunday.
    Weekly,
    Monthly,
}

impl Period {
    /// Last calendar day of the period containing `date`.
    pub fn end_of(self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Weekly => {
                date + Duration::days(6 - date.weekday().num_days_from_monday() as i64)
            }
            Period::Monthly => {
                let (y, m) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                NaiveDate::from_ymd_opt(y, m, 1)
                    .map(|d| d - Duration::days(1))
                    .unwrap_or(date)
            }
        }
    }
}

/// Compounds daily returns per period, indexed by period end. The first
/// period is dropped since it rarely covers the whole period. `NaN` days
/// are skipped; a period with no finite day is `NaN`.
pub fn compound_by_period(dates: &[NaiveDate], returns: &[f64], period: Period) -> TimeSeries {
    let mut grouped: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();
    for (date, r) in dates.iter().zip(returns) {
        let growth = grouped.entry(period.end_of(*date)).or_insert(None);
        if r.is_finite() {
            *growth = Some(growth.unwrap_or(1.0) * (1.0 + r));
        }
    }
    let (dates, values): (Vec<NaiveDate>, Vec<f64>) = grouped
        .into_iter()
        .skip(1)
        .map(|(end, g)| (end, g.map(|g| g - 1.0).unwrap_or(f64::NAN)))
        .unzip();
    TimeSeries::new(dates, values)
}

/// Values of `a` and `b` on the dates both carry a finite value.
pub fn align(a: &TimeSeries, b: &TimeSeries) -> (Vec<NaiveDate>, Vec<f64>, Vec<f64>) {
    let lookup: BTreeMap<NaiveDate, f64> = b
        .dates
        .iter()
        .copied()
        .zip(b.values.iter().copied())
        .collect();
    let mut dates = Vec::new();
    let mut left = Vec::new();
    let mut right = Vec::new();
    for (date, v) in a.dates.iter().zip(&a.values) {
        if let Some(w) = lookup.get(date) {
            if v.is_finite() && w.is_finite() {
                dates.push(*date);
                left.push(*v);
                right.push(*w);
            }
        }
    }
    (dates, left, right)
}
