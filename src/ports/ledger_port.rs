//! Ledger access port trait.

use crate::domain::error::FundError;
use crate::domain::ledger::{IncomeRow, TransactionRow};

pub trait LedgerPort {
    fn transactions(&self) -> Result<Vec<TransactionRow>, FundError>;
    fn income(&self) -> Result<Vec<IncomeRow>, FundError>;
}
