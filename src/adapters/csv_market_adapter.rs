//! CSV market data adapter: one `<TICKER>.csv` per instrument.
//!
//! Expected header (case-insensitive): `date,close` plus optional
//! `dividends` and `stock_splits`. Dates may carry a time suffix
//! (`2024-01-15 00:00:00-05:00`); only the date part is used.

use crate::domain::error::FundError;
use crate::domain::market_data::DailyBar;
use crate::ports::market_data_port::MarketDataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvMarketAdapter {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    close: usize,
    dividend: Option<usize>,
    split: Option<usize>,
}

impl CsvMarketAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }

    /// Tickers with a price file, sorted.
    pub fn available_tickers(&self) -> Result<Vec<String>, FundError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| FundError::MarketData {
            ticker: "*".into(),
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(ticker) = name.strip_suffix(".csv") {
                tickers.push(ticker.to_string());
            }
        }
        tickers.sort();
        Ok(tickers)
    }
}

fn locate_columns(headers: &csv::StringRecord, ticker: &str) -> Result<Columns, FundError> {
    let find = |names: &[&str]| {
        headers.iter().position(|h| {
            let h = h.trim().to_lowercase().replace(' ', "_");
            names.contains(&h.as_str())
        })
    };
    let missing = |col: &str| FundError::MarketData {
        ticker: ticker.to_string(),
        reason: format!("missing {col} column"),
    };
    Ok(Columns {
        date: find(&["date", "datetime"]).ok_or_else(|| missing("date"))?,
        close: find(&["close"]).ok_or_else(|| missing("close"))?,
        dividend: find(&["dividends", "dividend"]),
        split: find(&["stock_splits", "splits", "split"]),
    })
}

fn parse_number(value: Option<&str>) -> Option<f64> {
    let v = value?.trim();
    if v.is_empty() { None } else { v.parse().ok() }
}

impl MarketDataPort for CsvMarketAdapter {
    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<DailyBar>>, FundError> {
        let path = self.csv_path(ticker);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| FundError::MarketData {
            ticker: ticker.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| FundError::MarketData {
            ticker: ticker.to_string(),
            reason: format!("CSV header error: {e}"),
        })?;
        let cols = locate_columns(headers, ticker)?;
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| FundError::MarketData {
                ticker: ticker.to_string(),
                reason: format!("CSV parse error: {e}"),
            })?;

            let date_str = record.get(cols.date).unwrap_or("").trim();
            let date = date_str
                .get(..10)
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .ok_or_else(|| FundError::MarketData {
                    ticker: ticker.to_string(),
                    reason: format!("invalid date '{date_str}'"),
                })?;

            if date < start || date > end {
                continue;
            }

            let close = parse_number(record.get(cols.close)).unwrap_or(f64::NAN);
            bars.push(DailyBar {
                date,
                close,
                dividend: cols
                    .dividend
                    .and_then(|c| parse_number(record.get(c)))
                    .unwrap_or(0.0),
                split_ratio: cols
                    .split
                    .and_then(|c| parse_number(record.get(c)))
                    .unwrap_or(0.0),
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(Some(bars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "Date,Close,Dividends,Stock Splits\n\
            2024-01-15 00:00:00-05:00,100.0,0.0,0.0\n\
            2024-01-16 00:00:00-05:00,105.0,0.5,0.0\n\
            2024-01-17 00:00:00-05:00,55.0,0.0,2.0\n";

        fs::write(path.join("ABC.csv"), csv_content).unwrap();
        fs::write(path.join("VTI.csv"), "date,close\n2024-01-15,200\n").unwrap();
        fs::write(path.join("BAD.csv"), "date,open\n2024-01-15,1\n").unwrap();

        (dir, path)
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn fetch_reads_dividends_and_splits() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketAdapter::new(path);

        let bars = adapter.fetch("ABC", d(15), d(17)).unwrap().unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, d(15));
        assert_eq!(bars[1].dividend, 0.5);
        assert_eq!(bars[2].split_ratio, 2.0);
    }

    #[test]
    fn optional_columns_default_to_zero() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketAdapter::new(path);

        let bars = adapter.fetch("VTI", d(1), d(31)).unwrap().unwrap();
        assert_eq!(bars, vec![DailyBar::new(d(15), 200.0)]);
    }

    #[test]
    fn fetch_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketAdapter::new(path);

        let bars = adapter.fetch("ABC", d(16), d(16)).unwrap().unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 105.0);
    }

    #[test]
    fn missing_file_is_unknown_ticker() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketAdapter::new(path);
        assert_eq!(adapter.fetch("XYZ", d(1), d(31)).unwrap(), None);
    }

    #[test]
    fn missing_close_column_is_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketAdapter::new(path);
        let err = adapter.fetch("BAD", d(1), d(31)).unwrap_err();
        assert!(matches!(err, FundError::MarketData { ticker, .. } if ticker == "BAD"));
    }

    #[test]
    fn available_tickers_lists_files() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketAdapter::new(path);
        assert_eq!(adapter.available_tickers().unwrap(), vec!["ABC", "BAD", "VTI"]);
    }
}
