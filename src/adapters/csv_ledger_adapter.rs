//! CSV ledger adapter for the custodian's transaction and income exports.
//!
//! Columns are located by header name. Both the custodian's export headers
//! (`D-TRADE`, `Ticker/Option Symbol number`, ...) and plain snake_case
//! names are accepted.

use crate::domain::error::FundError;
use crate::domain::ledger::{IncomeRow, TransactionRow};
use crate::ports::ledger_port::LedgerPort;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const TRADE_DATE: &[&str] = &["d-trade", "trade_date", "trade date", "date"];
const TICKER: &[&str] = &["ticker/option symbol number", "ticker", "symbol"];
const QUANTITY: &[&str] = &["share/par value", "quantity", "shares"];
const PRINCIPAL: &[&str] = &["a-prin-trd-bse", "principal", "amount"];

const RECOGNITION_DATE: &[&str] = &["recognition date", "recognition_date", "date"];
const NARRATIVE: &[&str] = &["narrative - short", "narrative", "description"];
const NET_AMOUNT: &[&str] = &["net amount - base", "net_amount", "amount"];

pub struct CsvLedgerAdapter {
    transactions_path: PathBuf,
    income_path: Option<PathBuf>,
}

impl CsvLedgerAdapter {
    pub fn new(transactions_path: PathBuf, income_path: Option<PathBuf>) -> Self {
        Self {
            transactions_path,
            income_path,
        }
    }
}

fn ledger_err(reason: impl Into<String>) -> FundError {
    FundError::Ledger {
        reason: reason.into(),
    }
}

fn read_csv(path: &Path) -> Result<(csv::StringRecord, Vec<csv::StringRecord>), FundError> {
    let content = fs::read_to_string(path)
        .map_err(|e| ledger_err(format!("failed to read {}: {}", path.display(), e)))?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| ledger_err(format!("CSV header error in {}: {}", path.display(), e)))?
        .clone();
    let mut records = Vec::new();
    for result in rdr.records() {
        records.push(result.map_err(|e| ledger_err(format!("CSV parse error: {e}")))?);
    }
    Ok((headers, records))
}

fn column(headers: &csv::StringRecord, aliases: &[&str]) -> Result<usize, FundError> {
    headers
        .iter()
        .position(|h| aliases.contains(&h.trim().to_lowercase().as_str()))
        .ok_or_else(|| ledger_err(format!("missing column '{}'", aliases[0])))
}

/// Accepts ISO dates, US `m/d/Y` dates and either with a time suffix.
pub fn parse_ledger_date(value: &str) -> Option<NaiveDate> {
    let v = value.trim();
    let date_part = v.split([' ', 'T']).next().unwrap_or(v);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%m/%d/%Y"))
        .ok()
}

/// Parses amounts such as `$1,234.50`, `-5000` or `(250.00)`.
pub fn parse_amount(value: &str) -> Option<f64> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    match cleaned.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => inner.parse::<f64>().ok().map(|v| -v),
        None => cleaned.parse().ok(),
    }
}

impl LedgerPort for CsvLedgerAdapter {
    fn transactions(&self) -> Result<Vec<TransactionRow>, FundError> {
        let (headers, records) = read_csv(&self.transactions_path)?;
        let date_col = column(&headers, TRADE_DATE)?;
        let ticker_col = column(&headers, TICKER)?;
        let qty_col = column(&headers, QUANTITY)?;
        let principal_col = column(&headers, PRINCIPAL)?;

        let mut rows = Vec::with_capacity(records.len());
        for (line, record) in records.iter().enumerate() {
            let raw_date = record.get(date_col).unwrap_or("");
            if raw_date.trim().is_empty() {
                debug!(line = line + 2, "transaction without trade date skipped");
                continue;
            }
            let trade_date = parse_ledger_date(raw_date)
                .ok_or_else(|| ledger_err(format!("invalid trade date '{raw_date}' on line {}", line + 2)))?;
            let ticker = record.get(ticker_col).unwrap_or("").trim().to_uppercase();
            if ticker.is_empty() {
                warn!(line = line + 2, "transaction without ticker skipped");
                continue;
            }
            rows.push(TransactionRow {
                trade_date,
                ticker,
                quantity: record.get(qty_col).and_then(parse_amount).unwrap_or(0.0),
                principal: record.get(principal_col).and_then(parse_amount).unwrap_or(0.0),
            });
        }
        Ok(rows)
    }

    fn income(&self) -> Result<Vec<IncomeRow>, FundError> {
        let Some(path) = &self.income_path else {
            return Ok(Vec::new());
        };
        let (headers, records) = read_csv(path)?;
        let date_col = column(&headers, RECOGNITION_DATE)?;
        let amount_col = column(&headers, NET_AMOUNT)?;
        let narrative_col = column(&headers, NARRATIVE).ok();

        let mut rows = Vec::new();
        for (line, record) in records.iter().enumerate() {
            let raw_date = record.get(date_col).unwrap_or("");
            if raw_date.trim().is_empty() {
                debug!(line = line + 2, "income row without recognition date skipped");
                continue;
            }
            let recognition_date = parse_ledger_date(raw_date).ok_or_else(|| {
                ledger_err(format!("invalid recognition date '{raw_date}' on line {}", line + 2))
            })?;
            rows.push(IncomeRow {
                recognition_date,
                narrative: narrative_col
                    .and_then(|c| record.get(c))
                    .unwrap_or("")
                    .trim()
                    .to_string(),
                net_amount: record.get(amount_col).and_then(parse_amount).unwrap_or(0.0),
            });
        }
        Ok(rows)
    }
}
