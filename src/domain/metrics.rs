//! Performance statistics over daily return columns.

use super::frame::Frame;
use super::regression::sample_std;
use super::table::Table;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub const STAT_ROWS: [&str; 6] = ["AnnRtn", "AnnStd", "Sharpe", "MDD", "CurrentDD", "DaysDD>1%"];

/// Days below the running peak by more than this count as drawdown days.
pub const DRAWDOWN_DAY_THRESHOLD: f64 = -0.01;

/// Annualized return, volatility, Sharpe and drawdown figures of one return
/// stream. `NaN` returns are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceRecord {
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    /// Non-positive; -0.25 is a 25% peak-to-trough loss.
    pub max_drawdown: f64,
    /// Drawdown on the last day.
    pub current_drawdown: f64,
    pub drawdown_days: usize,
}

impl PerformanceRecord {
    pub fn compute(returns: &[f64], scale: f64) -> Self {
        let clean: Vec<f64> = returns.iter().copied().filter(|r| r.is_finite()).collect();
        let n = clean.len();

        let annualized_return = if n > 0 {
            let growth: f64 = clean.iter().map(|r| 1.0 + r).product();
            growth.powf(scale / n as f64) - 1.0
        } else {
            f64::NAN
        };
        let annualized_volatility = sample_std(&clean) * scale.sqrt();
        let sharpe_ratio = if annualized_volatility == 0.0 {
            0.0
        } else {
            annualized_return / annualized_volatility
        };
        let drawdowns = drawdown_series(&growth_index(&clean));
        let max_drawdown = drawdowns.iter().copied().fold(0.0, f64::min);
        let current_drawdown = drawdowns.last().copied().unwrap_or(0.0);
        let drawdown_days = drawdowns
            .iter()
            .filter(|dd| **dd < DRAWDOWN_DAY_THRESHOLD)
            .count();

        Self {
            annualized_return,
            annualized_volatility,
            sharpe_ratio,
            max_drawdown,
            current_drawdown,
            drawdown_days,
        }
    }

    fn values(&self) -> [f64; 6] {
        [
            self.annualized_return,
            self.annualized_volatility,
            self.sharpe_ratio,
            self.max_drawdown,
            self.current_drawdown,
            self.drawdown_days as f64,
        ]
    }
}

/// Cumulative product of `1 + r`; a `NaN` day leaves the index unchanged.
pub fn growth_index(returns: &[f64]) -> Vec<f64> {
    let mut level = 1.0;
    returns
        .iter()
        .map(|r| {
            if r.is_finite() {
                level *= 1.0 + r;
            }
            level
        })
        .collect()
}

/// Drawdown from the running peak at each point.
pub fn drawdown_series(growth: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    growth
        .iter()
        .map(|g| {
            peak = peak.max(*g);
            if peak > 0.0 { g / peak - 1.0 } else { 0.0 }
        })
        .collect()
}

/// Growth-of-$1 frame, one column per input column.
pub fn growth_frame(returns: &Frame) -> Frame {
    map_columns(returns, growth_index)
}

pub fn drawdown_frame(returns: &Frame) -> Frame {
    map_columns(returns, |col| drawdown_series(&growth_index(col)))
}

fn map_columns(frame: &Frame, f: impl Fn(&[f64]) -> Vec<f64>) -> Frame {
    let columns: Vec<Vec<f64>> = (0..frame.ncols()).map(|c| f(&frame.column(c))).collect();
    let rows = (0..frame.nrows())
        .map(|r| columns.iter().map(|c| c[r]).collect())
        .collect();
    Frame::from_rows(frame.dates.clone(), frame.columns.clone(), rows)
}

/// One row per `STAT_ROWS` label by instrument columns.
pub fn performance_table(returns: &Frame, scale: f64) -> Table {
    let records: Vec<PerformanceRecord> = (0..returns.ncols())
        .map(|c| PerformanceRecord::compute(&returns.column(c), scale))
        .collect();
    let mut table = Table::new("Stat", returns.columns.clone());
    for (i, label) in STAT_ROWS.iter().enumerate() {
        table.push_row(*label, records.iter().map(|r| r.values()[i]).collect());
    }
    table
}
