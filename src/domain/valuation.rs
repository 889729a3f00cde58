//! Market value, weights, NAV and fund returns.
//!
//! NAV is additive: market value plus the running totals of trade cost and
//! cash income, with the inception day's cash term replaced by the fund's
//! initial value.

use chrono::NaiveDate;
use tracing::warn;

use super::calendar::{BusinessCalendar, format_date};
use super::frame::{Frame, TimeSeries};
use super::table::Table;

/// Components of NAV on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub date: NaiveDate,
    pub market_value: f64,
    pub trade_cost: f64,
    pub cash_income: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub market_values: Frame,
    pub weights: Frame,
    pub states: Vec<PortfolioState>,
    pub nav: TimeSeries,
    pub returns: TimeSeries,
}

impl Valuation {
    pub fn compute(
        positions: &Frame,
        close: &Frame,
        trade_costs: &TimeSeries,
        income: &TimeSeries,
        initial_value: f64,
        inception: NaiveDate,
    ) -> Self {
        let market_values = market_values(positions, close);
        let weights = weights(&market_values);
        let aggregate = market_values.row_sums();

        let calendar = BusinessCalendar::from_dates(positions.dates.clone());
        let seed_row = calendar.snap_forward(inception);
        let states: Vec<PortfolioState> = positions
            .dates
            .iter()
            .enumerate()
            .map(|(i, date)| PortfolioState {
                date: *date,
                market_value: aggregate[i],
                trade_cost: trade_costs.values[i],
                cash_income: if Some(i) == seed_row {
                    initial_value
                } else {
                    income.values[i]
                },
            })
            .collect();

        let nav = nav_series(&states);
        let returns = fund_returns(&nav);
        Self {
            market_values,
            weights,
            states,
            nav,
            returns,
        }
    }
}

/// One row per day: market value, trade cost and cash flow.
pub fn states_table(states: &[PortfolioState]) -> Table {
    let mut table = Table::new(
        "Date",
        vec!["MktValue".into(), "Cost".into(), "Cash".into()],
    );
    for s in states {
        table.push_row(
            format_date(s.date),
            vec![s.market_value, s.trade_cost, s.cash_income],
        );
    }
    table
}

/// Position × close per cell. A missing close is 0 for a flat position and
/// `NaN` for a held one.
pub fn market_values(positions: &Frame, close: &Frame) -> Frame {
    let prices = close.select_columns(&positions.columns);
    let mut mv = Frame::filled(positions.dates.clone(), positions.columns.clone(), 0.0);
    for col in 0..positions.ncols() {
        let mut warned = false;
        for row in 0..positions.nrows() {
            let qty = positions.get(row, col);
            let px = prices.get(row, col);
            let value = if px.is_finite() {
                qty * px
            } else if qty == 0.0 {
                0.0
            } else {
                if !warned {
                    warn!(
                        ticker = %positions.columns[col],
                        date = %positions.dates[row],
                        "held position has no price; excluded from market value"
                    );
                    warned = true;
                }
                f64::NAN
            };
            mv.set(row, col, value);
        }
    }
    mv
}

/// Market value share of the day's total; 0 when the total is 0 or the
/// cell is missing.
pub fn weights(market_values: &Frame) -> Frame {
    let totals = market_values.row_sums();
    let mut w = Frame::filled(
        market_values.dates.clone(),
        market_values.columns.clone(),
        0.0,
    );
    for (row, total) in totals.iter().enumerate() {
        if *total == 0.0 || !total.is_finite() {
            continue;
        }
        for col in 0..market_values.ncols() {
            let v = market_values.get(row, col);
            if v.is_finite() {
                w.set(row, col, v / total);
            }
        }
    }
    w
}

pub fn nav_series(states: &[PortfolioState]) -> TimeSeries {
    let mut cost = 0.0;
    let mut cash = 0.0;
    let values = states
        .iter()
        .map(|s| {
            cost += s.trade_cost;
            cash += s.cash_income;
            s.market_value + cost + cash
        })
        .collect();
    TimeSeries::new(states.iter().map(|s| s.date).collect(), values)
}

/// NAV(t)/NAV(t−1) − 1, with 0 on the first day and after a zero NAV.
pub fn fund_returns(nav: &TimeSeries) -> TimeSeries {
    let mut values = Vec::with_capacity(nav.len());
    for (i, v) in nav.values.iter().enumerate() {
        if i == 0 {
            values.push(0.0);
            continue;
        }
        let prev = nav.values[i - 1];
        values.push(if prev != 0.0 && prev.is_finite() { v / prev - 1.0 } else { 0.0 });
    }
    TimeSeries::new(nav.dates.clone(), values)
}

/// Shifts a NAV slice so its first value equals `initial_value`.
pub fn rebase_nav(nav: &TimeSeries, initial_value: f64) -> TimeSeries {
    let offset = match nav.first() {
        Some(first) => initial_value - first,
        None => return nav.clone(),
    };
    TimeSeries::new(
        nav.dates.clone(),
        nav.values.iter().map(|v| v + offset).collect(),
    )
}

/// Which slice of history a report covers.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportingWindow {
    InceptionToDate,
    ClassPeriod {
        label: String,
        start: NaiveDate,
        end: Option<NaiveDate>,
        initial_value: f64,
    },
}

/// A window resolved against the working calendar (inclusive rows).
#[derive(Debug, Clone, PartialEq)]
pub struct WindowBounds {
    pub label: String,
    pub start_row: usize,
    pub end_row: usize,
    pub initial_value: Option<f64>,
}

impl WindowBounds {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start_row..self.end_row + 1
    }
}

impl ReportingWindow {
    /// Clamps the window into the calendar. Returns `None` for an empty
    /// calendar or a window ending before it starts.
    pub fn resolve(&self, calendar: &BusinessCalendar) -> Option<WindowBounds> {
        let last = calendar.len().checked_sub(1)?;
        match self {
            ReportingWindow::InceptionToDate => Some(WindowBounds {
                label: "Inception to Date".to_string(),
                start_row: 0,
                end_row: last,
                initial_value: None,
            }),
            ReportingWindow::ClassPeriod {
                label,
                start,
                end,
                initial_value,
            } => {
                let start_row = match calendar.snap_forward(*start) {
                    Some(row) => row,
                    None => {
                        warn!(start = %start, "window starts after available data; using last date");
                        last
                    }
                };
                if calendar.first().is_some_and(|f| *start < f) {
                    warn!(start = %start, "window starts before available data; using first date");
                }
                let end_row = match end {
                    Some(end) => calendar.snap_backward(*end)?,
                    None => last,
                };
                if end_row < start_row {
                    return None;
                }
                Some(WindowBounds {
                    label: label.clone(),
                    start_row,
                    end_row,
                    initial_value: Some(*initial_value),
                })
            }
        }
    }
}
