//! Market data port trait.

use crate::domain::error::FundError;
use crate::domain::market_data::DailyBar;
use chrono::NaiveDate;

/// Daily close, dividend and split data per ticker. Implementations are
/// shared across the per-ticker fan-out, hence `Sync`.
pub trait MarketDataPort: Sync {
    /// Bars between `start` and `end` inclusive. `Ok(None)` means the
    /// provider does not know the ticker.
    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<DailyBar>>, FundError>;
}
