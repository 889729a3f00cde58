//! Market data normalization and panel assembly.
//!
//! Raw provider bars are turned into per-ticker [`PriceSeries`] aligned to the
//! business-day calendar, then assembled into a [`MarketPanel`] under a
//! [`JoinPolicy`].

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use super::calendar::BusinessCalendar;
use super::frame::Frame;

/// Raw daily row as delivered by a market data port.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub close: f64,
    /// Cash dividend paid on `date`, 0 when none.
    pub dividend: f64,
    /// Split ratio effective on `date` (2.0 for 2-for-1), 0 when none.
    pub split_ratio: f64,
}

impl DailyBar {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            dividend: 0.0,
            split_ratio: 0.0,
        }
    }
}

/// Bar-level quantities derived from consecutive closes.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedBar {
    pub date: NaiveDate,
    pub close: f64,
    pub total_return: f64,
    pub price_delta: f64,
    pub split_factor: f64,
}

/// Sorts bars, drops duplicate dates (last one wins) and derives total
/// return and price delta. The first bar has no previous close, so its
/// return and delta are `NaN`.
pub fn derive_bars(bars: &[DailyBar]) -> Vec<DerivedBar> {
    let mut sorted = bars.to_vec();
    sorted.sort_by_key(|b| b.date);
    let mut deduped: Vec<DailyBar> = Vec::with_capacity(sorted.len());
    for bar in sorted {
        match deduped.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => deduped.push(bar),
        }
    }

    let mut prev_close = f64::NAN;
    deduped
        .into_iter()
        .map(|bar| {
            let dividend = if bar.dividend.is_finite() { bar.dividend } else { 0.0 };
            let (total_return, price_delta) = if prev_close.is_finite() && prev_close != 0.0 {
                (
                    bar.close / prev_close - 1.0 + dividend / prev_close,
                    bar.close - prev_close + dividend,
                )
            } else {
                (f64::NAN, f64::NAN)
            };
            if bar.close.is_finite() {
                prev_close = bar.close;
            }
            DerivedBar {
                date: bar.date,
                close: bar.close,
                total_return,
                price_delta,
                split_factor: if bar.split_ratio.is_finite() { bar.split_ratio } else { 0.0 },
            }
        })
        .collect()
}

/// Per-ticker series aligned to a calendar. Missing values are `NaN`;
/// `split_factor` is 0 on days without a split.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub ticker: String,
    pub close: Vec<f64>,
    pub total_return: Vec<f64>,
    pub split_factor: Vec<f64>,
    pub price_delta: Vec<f64>,
}

impl PriceSeries {
    /// A gap: every value missing.
    pub fn empty(ticker: &str, len: usize) -> Self {
        Self {
            ticker: ticker.to_string(),
            close: vec![f64::NAN; len],
            total_return: vec![f64::NAN; len],
            split_factor: vec![0.0; len],
            price_delta: vec![f64::NAN; len],
        }
    }

    pub fn has_data(&self) -> bool {
        self.close.iter().any(|c| c.is_finite())
    }

    /// Reindexes raw bars onto `calendar`. Bars before the calendar only
    /// provide the previous close; a split on a non-calendar date moves to
    /// the next calendar date.
    pub fn normalize(ticker: &str, bars: &[DailyBar], calendar: &BusinessCalendar) -> Self {
        let mut series = Self::empty(ticker, calendar.len());
        let first = match calendar.first() {
            Some(d) => d,
            None => return series,
        };

        for bar in derive_bars(bars) {
            if let Some(i) = calendar.position(bar.date) {
                series.close[i] = bar.close;
                series.total_return[i] = bar.total_return;
                series.price_delta[i] = bar.price_delta;
            }
            if bar.split_factor != 0.0 && bar.date >= first {
                match calendar.snap_forward(bar.date) {
                    Some(i) => series.split_factor[i] = combine_splits(series.split_factor[i], bar.split_factor),
                    None => warn!(ticker, date = %bar.date, "split after calendar end ignored"),
                }
            }
        }
        series
    }
}

fn combine_splits(existing: f64, factor: f64) -> f64 {
    if existing == 0.0 { factor } else { existing * factor }
}

/// How per-ticker series with different coverage are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinPolicy {
    /// Keep only dates on which every ticker with data has a close.
    Strict,
    /// Keep every date on which any ticker has a close; fill the rest.
    #[default]
    Permissive,
}

impl FromStr for JoinPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" | "inner" => Ok(JoinPolicy::Strict),
            "permissive" | "outer" => Ok(JoinPolicy::Permissive),
            other => Err(format!("unknown join policy '{other}' (expected strict or permissive)")),
        }
    }
}

impl fmt::Display for JoinPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinPolicy::Strict => write!(f, "strict"),
            JoinPolicy::Permissive => write!(f, "permissive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GapKind {
    NoData,
    ProviderError(String),
    PartialHistory { missing_days: usize },
    InsufficientHistory { observations: usize, minimum: usize },
}

impl fmt::Display for GapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GapKind::NoData => write!(f, "no market data"),
            GapKind::ProviderError(reason) => write!(f, "provider error: {reason}"),
            GapKind::PartialHistory { missing_days } => {
                write!(f, "missing prices on {missing_days} days")
            }
            GapKind::InsufficientHistory {
                observations,
                minimum,
            } => write!(f, "only {observations} observations, minimum {minimum}"),
        }
    }
}

/// A ticker whose data was incomplete for this run.
#[derive(Debug, Clone, PartialEq)]
pub struct DataGap {
    pub ticker: String,
    pub kind: GapKind,
}

/// Close, return, split and delta frames on the working calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketPanel {
    pub calendar: BusinessCalendar,
    pub tickers: Vec<String>,
    pub close: Frame,
    pub returns: Frame,
    pub split_factor: Frame,
    pub price_delta: Frame,
}

pub struct PanelAssembly {
    pub panel: MarketPanel,
    /// Partial-history gaps found while joining. Tickers with no data at
    /// all are left as `NaN` columns and are reported by the caller.
    pub gaps: Vec<DataGap>,
    pub dropped_dates: usize,
}

impl MarketPanel {
    pub fn assemble(
        calendar: &BusinessCalendar,
        series: Vec<PriceSeries>,
        policy: JoinPolicy,
    ) -> PanelAssembly {
        let n = calendar.len();
        let with_data: Vec<bool> = series.iter().map(|s| s.has_data()).collect();

        let keep: Vec<bool> = (0..n)
            .map(|i| {
                let present: Vec<bool> = series
                    .iter()
                    .zip(&with_data)
                    .filter(|(_, has)| **has)
                    .map(|(s, _)| s.close[i].is_finite())
                    .collect();
                match policy {
                    JoinPolicy::Strict => !present.is_empty() && present.iter().all(|p| *p),
                    JoinPolicy::Permissive => present.iter().any(|p| *p),
                }
            })
            .collect();

        let kept: Vec<usize> = (0..n).filter(|&i| keep[i]).collect();
        let dropped_dates = n - kept.len();
        if dropped_dates > 0 {
            debug!(policy = %policy, dropped_dates, "dates without prices removed from calendar");
        }
        let dates: Vec<NaiveDate> = kept.iter().map(|&i| calendar.dates()[i]).collect();
        let tickers: Vec<String> = series.iter().map(|s| s.ticker.clone()).collect();

        let mut close = Frame::filled(dates.clone(), tickers.clone(), f64::NAN);
        let mut returns = Frame::filled(dates.clone(), tickers.clone(), f64::NAN);
        let mut split_factor = Frame::filled(dates.clone(), tickers.clone(), 0.0);
        let mut price_delta = Frame::filled(dates.clone(), tickers.clone(), f64::NAN);
        let mut gaps = Vec::new();

        for (col, s) in series.iter().enumerate() {
            // Splits on dropped dates are carried onto the next kept date.
            let mut pending = 0.0;
            let mut row = 0;
            for i in 0..n {
                if s.split_factor[i] != 0.0 {
                    pending = combine_splits(pending, s.split_factor[i]);
                }
                if !keep[i] {
                    continue;
                }
                if pending != 0.0 {
                    split_factor.set(row, col, pending);
                    pending = 0.0;
                }
                row += 1;
            }
            if pending != 0.0 {
                warn!(ticker = %s.ticker, "split on a dropped trailing date ignored");
            }

            if !with_data[col] {
                continue;
            }

            let mut last_close = f64::NAN;
            let mut missing_days = 0;
            for (row, &i) in kept.iter().enumerate() {
                let c = s.close[i];
                if c.is_finite() {
                    last_close = c;
                    close.set(row, col, c);
                    returns.set(row, col, finite_or_zero(s.total_return[i]));
                    price_delta.set(row, col, finite_or_zero(s.price_delta[i]));
                } else {
                    missing_days += 1;
                    close.set(row, col, last_close);
                    returns.set(row, col, 0.0);
                    price_delta.set(row, col, 0.0);
                }
            }
            if missing_days > 0 {
                gaps.push(DataGap {
                    ticker: s.ticker.clone(),
                    kind: GapKind::PartialHistory { missing_days },
                });
            }
        }

        PanelAssembly {
            panel: MarketPanel {
                calendar: BusinessCalendar::from_dates(dates),
                tickers,
                close,
                returns,
                split_factor,
                price_delta,
            },
            gaps,
            dropped_dates,
        }
    }

    pub fn column(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    pub fn has_data(&self, ticker: &str) -> bool {
        self.column(ticker)
            .map(|c| self.close.column(c).iter().any(|v| v.is_finite()))
            .unwrap_or(false)
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}
