//! Position reconstruction from net trades and split factors.

use chrono::NaiveDate;
use tracing::debug;

use super::frame::Frame;
use super::ledger::TradeAlignment;

/// Split-adjusted trade grid and the cumulative positions derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionBook {
    pub adjusted_trades: Frame,
    pub positions: Frame,
}

impl PositionBook {
    /// Places snapped trades on a zero grid, re-expresses them in post-split
    /// share counts and accumulates them into positions.
    pub fn reconstruct(
        alignment: &TradeAlignment,
        dates: &[NaiveDate],
        tickers: &[String],
        split_factor: &Frame,
    ) -> Self {
        let mut trades = trade_grid(alignment, dates, tickers);
        apply_splits(&mut trades, split_factor);
        let positions = trades.cumsum();
        Self {
            adjusted_trades: trades,
            positions,
        }
    }

    pub fn position(&self, ticker: &str, row: usize) -> Option<f64> {
        self.positions
            .column_index(ticker)
            .map(|c| self.positions.get(row, c))
    }
}

/// Zero-filled (date × ticker) grid holding each trade at its snapped row.
pub fn trade_grid(alignment: &TradeAlignment, dates: &[NaiveDate], tickers: &[String]) -> Frame {
    let mut grid = Frame::filled(dates.to_vec(), tickers.to_vec(), 0.0);
    for trade in &alignment.trades {
        match grid.column_index(&trade.record.ticker) {
            Some(col) => {
                let current = grid.get(trade.row, col);
                grid.set(trade.row, col, current + trade.record.quantity);
            }
            None => debug!(ticker = %trade.record.ticker, "trade for ticker outside universe ignored"),
        }
    }
    grid
}

/// For every split date `k` (chronologically), multiplies each quantity
/// strictly before `k` by the factor at `k`. `split_factor` must share the
/// grid's dates; columns are matched by ticker.
pub fn apply_splits(trades: &mut Frame, split_factor: &Frame) {
    for col in 0..trades.ncols() {
        let Some(split_col) = split_factor.column_index(&trades.columns[col]) else {
            continue;
        };
        for k in 0..split_factor.nrows() {
            let factor = split_factor.get(k, split_col);
            if factor == 0.0 || !factor.is_finite() {
                continue;
            }
            for row in 0..k.min(trades.nrows()) {
                let q = trades.get(row, col);
                trades.set(row, col, q * factor);
            }
        }
    }
}

/// Same adjustment expressed as one multiplier per row: the product of
/// every split factor strictly after that row.
pub fn cumulative_split_adjust(trades: &Frame, split_factor: &Frame) -> Frame {
    let mut out = trades.clone();
    for col in 0..trades.ncols() {
        let Some(split_col) = split_factor.column_index(&trades.columns[col]) else {
            continue;
        };
        let mut multiplier = 1.0;
        for row in (0..trades.nrows()).rev() {
            out.set(row, col, trades.get(row, col) * multiplier);
            let factor = split_factor.get(row, split_col);
            if factor != 0.0 && factor.is_finite() {
                multiplier *= factor;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::{SnappedTrade, TradeRecord};

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect()
    }

    fn snapped(row: usize, ticker: &str, qty: f64) -> SnappedTrade {
        SnappedTrade {
            row,
            record: TradeRecord {
                trade_date: dates(row + 1)[row],
                ticker: ticker.into(),
                quantity: qty,
                principal: 0.0,
            },
        }
    }

    fn splits(n: usize, ticker: &str, at: &[(usize, f64)]) -> Frame {
        let mut f = Frame::filled(dates(n), vec![ticker.to_string()], 0.0);
        for (row, factor) in at {
            f.set(*row, 0, *factor);
        }
        f
    }

    #[test]
    fn two_for_one_split_doubles_earlier_trades() {
        let alignment = TradeAlignment {
            trades: vec![snapped(0, "ABC", 10.0)],
            dropped: vec![],
        };
        let book = PositionBook::reconstruct(
            &alignment,
            &dates(6),
            &["ABC".to_string()],
            &splits(6, "ABC", &[(4, 2.0)]),
        );
        assert_eq!(book.adjusted_trades.get(0, 0), 20.0);
        assert_eq!(book.positions.column(0), vec![20.0; 6]);
    }

    #[test]
    fn trade_on_split_day_is_not_adjusted() {
        let alignment = TradeAlignment {
            trades: vec![snapped(0, "ABC", 10.0), snapped(2, "ABC", 5.0)],
            dropped: vec![],
        };
        let book = PositionBook::reconstruct(
            &alignment,
            &dates(4),
            &["ABC".to_string()],
            &splits(4, "ABC", &[(2, 3.0)]),
        );
        assert_eq!(book.positions.column(0), vec![30.0, 30.0, 35.0, 35.0]);
    }

    #[test]
    fn successive_splits_compound() {
        let alignment = TradeAlignment {
            trades: vec![snapped(0, "ABC", 1.0), snapped(2, "ABC", 1.0)],
            dropped: vec![],
        };
        let book = PositionBook::reconstruct(
            &alignment,
            &dates(5),
            &["ABC".to_string()],
            &splits(5, "ABC", &[(1, 2.0), (3, 4.0)]),
        );
        assert_eq!(book.adjusted_trades.column(0), vec![8.0, 0.0, 4.0, 0.0, 0.0]);
    }

    #[test]
    fn cumulative_matches_sequential() {
        let alignment = TradeAlignment {
            trades: vec![
                snapped(0, "ABC", 3.0),
                snapped(2, "ABC", -1.0),
                snapped(4, "ABC", 2.0),
            ],
            dropped: vec![],
        };
        let split = splits(6, "ABC", &[(1, 2.0), (3, 1.5), (5, 10.0)]);
        let grid = trade_grid(&alignment, &dates(6), &["ABC".to_string()]);
        let mut sequential = grid.clone();
        apply_splits(&mut sequential, &split);
        assert_eq!(sequential, cumulative_split_adjust(&grid, &split));
    }

    #[test]
    fn untraded_ticker_keeps_zero_column() {
        let alignment = TradeAlignment {
            trades: vec![snapped(1, "ABC", 4.0)],
            dropped: vec![],
        };
        let tickers = vec!["ABC".to_string(), "OLD".to_string()];
        let split = Frame::filled(dates(3), tickers.clone(), 0.0);
        let book = PositionBook::reconstruct(&alignment, &dates(3), &tickers, &split);
        assert_eq!(book.positions.column(1), vec![0.0; 3]);
        assert_eq!(book.position("ABC", 2), Some(4.0));
    }
}
