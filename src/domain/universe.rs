//! Instrument universe and per-ticker market data loading.
//!
//! The universe is every ticker the fund ever traded (cash vehicle
//! excluded) plus the benchmark. Each ticker is fetched and normalized
//! independently; a ticker that fails becomes a [`DataGap`] rather than an
//! error.

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::calendar::BusinessCalendar;
use crate::domain::error::FundError;
use crate::domain::ledger::{TransactionRow, traded_tickers};
use crate::domain::market_data::{DailyBar, DataGap, GapKind, PriceSeries};
use crate::ports::market_data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    /// Traded tickers in first-appearance order, followed by the benchmark
    /// when it was never traded.
    pub tickers: Vec<String>,
    pub benchmark: String,
}

impl Universe {
    pub fn from_transactions(rows: &[TransactionRow], cash_ticker: &str, benchmark: &str) -> Self {
        let mut tickers = traded_tickers(rows, cash_ticker);
        if !tickers.iter().any(|t| t == benchmark) {
            tickers.push(benchmark.to_string());
        }
        Self {
            tickers,
            benchmark: benchmark.to_string(),
        }
    }

    pub fn count(&self) -> usize {
        self.tickers.len()
    }

    /// Tickers other than the benchmark.
    pub fn holdings(&self) -> impl Iterator<Item = &String> {
        self.tickers.iter().filter(move |t| **t != self.benchmark)
    }
}

/// Raw bars per ticker, in universe order.
#[derive(Debug)]
pub struct FetchedBars {
    pub bars: Vec<(String, Vec<DailyBar>)>,
    pub gaps: Vec<DataGap>,
}

/// Fetches every ticker in parallel. Results keep the input order.
pub fn fetch_all(
    port: &dyn MarketDataPort,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> FetchedBars {
    let results: Vec<(String, Result<Option<Vec<DailyBar>>, FundError>)> = tickers
        .par_iter()
        .map(|ticker| (ticker.clone(), port.fetch(ticker, start, end)))
        .collect();

    let mut bars = Vec::with_capacity(results.len());
    let mut gaps = Vec::new();
    for (ticker, result) in results {
        match result {
            Ok(Some(rows)) if !rows.is_empty() => bars.push((ticker, rows)),
            Ok(_) => {
                warn!(ticker = %ticker, "no market data found");
                gaps.push(DataGap {
                    ticker: ticker.clone(),
                    kind: GapKind::NoData,
                });
                bars.push((ticker, Vec::new()));
            }
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "market data fetch failed");
                gaps.push(DataGap {
                    ticker: ticker.clone(),
                    kind: GapKind::ProviderError(e.to_string()),
                });
                bars.push((ticker, Vec::new()));
            }
        }
    }
    FetchedBars { bars, gaps }
}

#[derive(Debug)]
pub struct UniverseLoad {
    pub series: Vec<PriceSeries>,
    pub gaps: Vec<DataGap>,
}

/// Fetches and normalizes the universe onto `calendar`. Fails when nothing
/// has data or when the benchmark has none.
pub fn load_universe(
    port: &dyn MarketDataPort,
    universe: &Universe,
    calendar: &BusinessCalendar,
    fetch_start: NaiveDate,
    fetch_end: NaiveDate,
) -> Result<UniverseLoad, FundError> {
    let fetched = fetch_all(port, &universe.tickers, fetch_start, fetch_end);
    let mut gaps = fetched.gaps;

    let series: Vec<PriceSeries> = fetched
        .bars
        .par_iter()
        .map(|(ticker, bars)| PriceSeries::normalize(ticker, bars, calendar))
        .collect();

    // Bars that exist but fall entirely outside the calendar.
    for s in &series {
        if !s.has_data() && !gaps.iter().any(|g| g.ticker == s.ticker) {
            gaps.push(DataGap {
                ticker: s.ticker.clone(),
                kind: GapKind::NoData,
            });
        }
    }

    let valid = series.iter().filter(|s| s.has_data()).count();
    if valid == 0 {
        return Err(FundError::NoValidTickers);
    }
    let benchmark_ok = series
        .iter()
        .any(|s| s.ticker == universe.benchmark && s.has_data());
    if !benchmark_ok {
        return Err(FundError::BenchmarkMissing {
            ticker: universe.benchmark.clone(),
        });
    }

    info!(
        loaded = valid,
        total = universe.count(),
        "market data loaded"
    );
    Ok(UniverseLoad { series, gaps })
}
