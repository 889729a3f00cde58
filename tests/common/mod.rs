#![allow(dead_code)]

use chrono::NaiveDate;
use fundnav::domain::engine::FundConfig;
use fundnav::domain::error::FundError;
pub use fundnav::domain::ledger::{IncomeRow, TransactionRow};
pub use fundnav::domain::market_data::DailyBar;
use fundnav::ports::market_data_port::MarketDataPort;
use std::collections::HashMap;

pub struct MockMarketDataPort {
    pub data: HashMap<String, Vec<DailyBar>>,
    pub errors: HashMap<String, String>,
}

impl MockMarketDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<DailyBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockMarketDataPort {
    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<DailyBar>>, FundError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(FundError::MarketData {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(ticker).map(|bars| {
            bars.iter()
                .filter(|b| b.date >= start && b.date <= end)
                .cloned()
                .collect()
        }))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn bar(date_str: &str, close: f64) -> DailyBar {
    DailyBar::new(
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap(),
        close,
    )
}

pub fn split_bar(date_str: &str, close: f64, ratio: f64) -> DailyBar {
    let mut b = bar(date_str, close);
    b.split_ratio = ratio;
    b
}

pub fn tx(date_str: &str, ticker: &str, quantity: f64, principal: f64) -> TransactionRow {
    TransactionRow {
        trade_date: NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap(),
        ticker: ticker.to_string(),
        quantity,
        principal,
    }
}

pub fn income(date_str: &str, amount: f64) -> IncomeRow {
    IncomeRow {
        recognition_date: NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap(),
        narrative: "DIVIDEND".to_string(),
        net_amount: amount,
    }
}

/// Weekday bars from `start` following `closes`.
pub fn generate_bars(start: &str, closes: &[f64]) -> Vec<DailyBar> {
    let mut d = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
    let mut bars = Vec::with_capacity(closes.len());
    for &close in closes {
        while matches!(d.format("%a").to_string().as_str(), "Sat" | "Sun") {
            d = d.succ_opt().unwrap();
        }
        bars.push(DailyBar::new(d, close));
        d = d.succ_opt().unwrap();
    }
    bars
}

/// Deterministic wiggly price path starting at `base`.
pub fn price_path(base: f64, n: usize, drift: f64, amplitude: f64, phase: f64) -> Vec<f64> {
    let mut p = base;
    (0..n)
        .map(|i| {
            let r = drift + amplitude * ((i as f64) * 0.7 + phase).sin();
            p *= 1.0 + r;
            p
        })
        .collect()
}

/// The inception scenario: $338,400 fund buying 100 ABC at $50.
pub fn sample_config() -> FundConfig {
    let mut config = FundConfig::new(date(2023, 9, 14), 338_400.0);
    config.end_date = Some(date(2023, 9, 18));
    config.treynor_black.enabled = false;
    config
}

pub fn sample_market() -> MockMarketDataPort {
    MockMarketDataPort::new()
        .with_bars(
            "ABC",
            vec![
                bar("2023-09-14", 50.0),
                bar("2023-09-15", 51.0),
                bar("2023-09-18", 49.5),
            ],
        )
        .with_bars(
            "VTI",
            vec![
                bar("2023-09-13", 200.0),
                bar("2023-09-14", 201.0),
                bar("2023-09-15", 202.0),
                bar("2023-09-18", 200.0),
            ],
        )
}
