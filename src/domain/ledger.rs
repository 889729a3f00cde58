//! Trade ledger aggregation and cash-flow series.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::warn;

use super::calendar::BusinessCalendar;
use super::frame::TimeSeries;

/// One raw fill from the transaction ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRow {
    pub trade_date: NaiveDate,
    pub ticker: String,
    pub quantity: f64,
    pub principal: f64,
}

/// One posting from the income/expense ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomeRow {
    pub recognition_date: NaiveDate,
    pub narrative: String,
    pub net_amount: f64,
}

/// Net trade for one (date, ticker). Principal is signed: purchases are
/// negative cash flows.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub trade_date: NaiveDate,
    pub ticker: String,
    pub quantity: f64,
    pub principal: f64,
}

/// Sums every fill sharing a (trade date, ticker) key. Rows for the cash
/// sweep vehicle are skipped. Output is ordered by date, then ticker.
pub fn aggregate_trades(rows: &[TransactionRow], cash_ticker: &str) -> Vec<TradeRecord> {
    let mut grouped: BTreeMap<(NaiveDate, &str), (f64, f64)> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.ticker != cash_ticker) {
        let entry = grouped
            .entry((row.trade_date, row.ticker.as_str()))
            .or_insert((0.0, 0.0));
        entry.0 += row.quantity;
        entry.1 += row.principal;
    }
    grouped
        .into_iter()
        .map(|((trade_date, ticker), (quantity, principal))| TradeRecord {
            trade_date,
            ticker: ticker.to_string(),
            quantity,
            principal,
        })
        .collect()
}

/// A trade record pinned to a calendar row.
#[derive(Debug, Clone, PartialEq)]
pub struct SnappedTrade {
    pub row: usize,
    pub record: TradeRecord,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradeAlignment {
    pub trades: Vec<SnappedTrade>,
    /// Records dated after the last calendar date.
    pub dropped: Vec<TradeRecord>,
}

/// Snaps each record forward to the first calendar date on or after its
/// trade date.
pub fn align_trades(records: &[TradeRecord], calendar: &BusinessCalendar) -> TradeAlignment {
    let mut alignment = TradeAlignment::default();
    for record in records {
        match calendar.snap_forward(record.trade_date) {
            Some(row) => {
                if calendar.dates()[row] != record.trade_date {
                    tracing::debug!(
                        ticker = %record.ticker,
                        from = %record.trade_date,
                        to = %calendar.dates()[row],
                        "trade date snapped forward"
                    );
                }
                alignment.trades.push(SnappedTrade {
                    row,
                    record: record.clone(),
                });
            }
            None => {
                warn!(
                    ticker = %record.ticker,
                    date = %record.trade_date,
                    "trade after the reporting period dropped"
                );
                alignment.dropped.push(record.clone());
            }
        }
    }
    alignment
}

/// Net principal per calendar date across all non-cash tickers.
pub fn trade_cost_series(alignment: &TradeAlignment, calendar: &BusinessCalendar) -> TimeSeries {
    let mut costs = TimeSeries::zeros(calendar.dates().to_vec());
    for trade in &alignment.trades {
        costs.values[trade.row] += trade.record.principal;
    }
    costs
}

/// Net income per calendar date; postings off the calendar snap forward.
pub fn income_series(rows: &[IncomeRow], calendar: &BusinessCalendar) -> TimeSeries {
    let mut income = TimeSeries::zeros(calendar.dates().to_vec());
    for row in rows {
        match calendar.snap_forward(row.recognition_date) {
            Some(i) => income.values[i] += row.net_amount,
            None => warn!(
                date = %row.recognition_date,
                narrative = %row.narrative,
                "income posting after the reporting period dropped"
            ),
        }
    }
    income
}

/// Distinct tickers in first-appearance order, cash vehicle excluded.
pub fn traded_tickers(rows: &[TransactionRow], cash_ticker: &str) -> Vec<String> {
    let mut tickers: Vec<String> = Vec::new();
    for row in rows {
        if row.ticker != cash_ticker && !tickers.contains(&row.ticker) {
            tickers.push(row.ticker.clone());
        }
    }
    tickers
}
