//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for fundnav.
#[derive(Debug, thiserror::Error)]
pub enum FundError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("market data error for {ticker}: {reason}")]
    MarketData { ticker: String, reason: String },

    #[error("ledger error: {reason}")]
    Ledger { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error("no valid tickers remain after loading market data")]
    NoValidTickers,

    #[error("benchmark {ticker} has no market data")]
    BenchmarkMissing { ticker: String },

    #[error("no business days between {start} and {end}")]
    EmptyCalendar { start: NaiveDate, end: NaiveDate },

    #[error("insufficient data for {what}: have {have}, need {need}")]
    InsufficientData {
        what: String,
        have: usize,
        need: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FundError {
    pub fn insufficient(what: impl Into<String>, have: usize, need: usize) -> Self {
        FundError::InsufficientData {
            what: what.into(),
            have,
            need,
        }
    }
}

impl From<&FundError> for std::process::ExitCode {
    fn from(err: &FundError) -> Self {
        let code: u8 = match err {
            FundError::Io(_) | FundError::Report { .. } => 1,
            FundError::ConfigParse { .. }
            | FundError::ConfigMissing { .. }
            | FundError::ConfigInvalid { .. } => 2,
            FundError::MarketData { .. } | FundError::Ledger { .. } => 3,
            FundError::NoValidTickers
            | FundError::BenchmarkMissing { .. }
            | FundError::EmptyCalendar { .. } => 4,
            FundError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message() {
        let err = FundError::insufficient("benchmark regression", 3, 5);
        assert_eq!(
            err.to_string(),
            "insufficient data for benchmark regression: have 3, need 5"
        );
    }

    #[test]
    fn fatal_errors_share_exit_code() {
        let a: std::process::ExitCode = (&FundError::NoValidTickers).into();
        let b: std::process::ExitCode = (&FundError::BenchmarkMissing {
            ticker: "VTI".into(),
        })
            .into();
        assert_eq!(a, b);
    }
}
