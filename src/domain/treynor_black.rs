//! Treynor–Black active portfolio weights from monthly returns.

use tracing::{debug, info};

use super::error::FundError;
use super::frame::TimeSeries;
use super::market_data::{DataGap, GapKind};
use super::regression::{ols, sample_covariance};
use super::returns::align;
use super::table::Table;

pub const MONTHS_PER_YEAR: f64 = 12.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TreynorBlackRow {
    pub ticker: String,
    /// Annualized intercept.
    pub alpha: f64,
    pub beta: f64,
    /// Mean squared residual.
    pub mse: f64,
    pub raw_weight: f64,
    pub weight: f64,
    pub months: usize,
    /// Fund weight on the last window day; 0 when not held.
    pub current_weight: f64,
    /// Target weight minus current weight.
    pub weight_diff: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreynorBlack {
    /// Sorted by weight, largest first.
    pub rows: Vec<TreynorBlackRow>,
    pub covariance: Table,
    pub gaps: Vec<DataGap>,
}

/// Clips negative raw weights to zero and scales the rest to sum to 1.
/// Falls back to equal weights when nothing is positive.
pub fn normalize_weights(raw: &[f64]) -> Vec<f64> {
    let positive: f64 = raw.iter().filter(|w| **w > 0.0).sum();
    if positive > 0.0 {
        raw.iter()
            .map(|w| if *w > 0.0 { w / positive } else { 0.0 })
            .collect()
    } else if raw.is_empty() {
        Vec::new()
    } else {
        vec![1.0 / raw.len() as f64; raw.len()]
    }
}

impl TreynorBlack {
    /// `candidates` are monthly return series per ticker (benchmark and
    /// cash already removed); `benchmark` is the benchmark's monthly series.
    pub fn compute(
        candidates: &[(String, TimeSeries)],
        benchmark: &TimeSeries,
        min_months: usize,
    ) -> Result<Self, FundError> {
        let bench_months = benchmark.values.iter().filter(|v| v.is_finite()).count();
        if bench_months < min_months {
            return Err(FundError::insufficient(
                "benchmark monthly history",
                bench_months,
                min_months,
            ));
        }

        let mut gaps = Vec::new();
        let mut fitted: Vec<(TreynorBlackRow, TimeSeries)> = Vec::new();
        for (ticker, series) in candidates {
            let (dates, y, x) = align(series, benchmark);
            if dates.len() < min_months {
                debug!(ticker = %ticker, months = dates.len(), "excluded from Treynor-Black");
                gaps.push(DataGap {
                    ticker: ticker.clone(),
                    kind: GapKind::InsufficientHistory {
                        observations: dates.len(),
                        minimum: min_months,
                    },
                });
                continue;
            }
            let Some((intercept, slope, residuals)) = ols(&y, &x) else {
                continue;
            };
            let mse = residuals.iter().map(|e| e * e).sum::<f64>() / residuals.len() as f64;
            let alpha = intercept * MONTHS_PER_YEAR;
            fitted.push((
                TreynorBlackRow {
                    ticker: ticker.clone(),
                    alpha,
                    beta: slope,
                    mse,
                    raw_weight: if mse == 0.0 { 0.0 } else { alpha / mse },
                    weight: 0.0,
                    months: dates.len(),
                    current_weight: 0.0,
                    weight_diff: 0.0,
                },
                TimeSeries::new(dates, y),
            ));
        }
        if fitted.is_empty() {
            return Err(FundError::insufficient("Treynor-Black candidates", 0, 1));
        }

        let raw: Vec<f64> = fitted.iter().map(|(r, _)| r.raw_weight).collect();
        for ((row, _), w) in fitted.iter_mut().zip(normalize_weights(&raw)) {
            row.weight = w;
            row.weight_diff = w;
        }

        let covariance = covariance_table(&fitted);
        let mut rows: Vec<TreynorBlackRow> = fitted.into_iter().map(|(r, _)| r).collect();
        rows.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        info!(candidates = rows.len(), excluded = gaps.len(), "Treynor-Black weights computed");

        Ok(Self {
            rows,
            covariance,
            gaps,
        })
    }

    /// Joins the fund's current weights onto the target weights.
    pub fn apply_current_weights(&mut self, current: &[(String, f64)]) {
        for row in &mut self.rows {
            row.current_weight = current
                .iter()
                .find(|(t, _)| *t == row.ticker)
                .map(|(_, w)| *w)
                .filter(|w| w.is_finite())
                .unwrap_or(0.0);
            row.weight_diff = row.weight - row.current_weight;
        }
    }

    pub fn weights_table(&self) -> Table {
        let mut table = Table::new(
            "Ticker",
            [
                "alpha",
                "beta",
                "mse",
                "rawWeight",
                "weight",
                "months",
                "currentWeight",
                "weightDiff",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );
        for r in &self.rows {
            table.push_row(
                r.ticker.clone(),
                vec![
                    r.alpha,
                    r.beta,
                    r.mse,
                    r.raw_weight,
                    r.weight,
                    r.months as f64,
                    r.current_weight,
                    r.weight_diff,
                ],
            );
        }
        table
    }
}

/// Annualized sample covariance over the months every candidate shares.
fn covariance_table(fitted: &[(TreynorBlackRow, TimeSeries)]) -> Table {
    let tickers: Vec<String> = fitted.iter().map(|(r, _)| r.ticker.clone()).collect();
    let mut common: Vec<chrono::NaiveDate> = fitted[0].1.dates.clone();
    for (_, s) in &fitted[1..] {
        common.retain(|d| s.dates.contains(d));
    }
    let aligned: Vec<Vec<f64>> = fitted
        .iter()
        .map(|(_, s)| {
            common
                .iter()
                .filter_map(|d| s.dates.iter().position(|x| x == d).map(|i| s.values[i]))
                .collect()
        })
        .collect();

    let mut table = Table::new("Ticker", tickers.clone());
    for (i, ticker) in tickers.iter().enumerate() {
        let row = (0..tickers.len())
            .map(|j| sample_covariance(&aligned[i], &aligned[j]) * MONTHS_PER_YEAR)
            .collect();
        table.push_row(ticker.clone(), row);
    }
    table
}
