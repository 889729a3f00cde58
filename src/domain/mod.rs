//! Core domain types and logic.

pub mod calendar;
pub mod config_validation;
pub mod engine;
pub mod error;
pub mod frame;
pub mod ledger;
pub mod market_data;
pub mod metrics;
pub mod position;
pub mod regression;
pub mod returns;
pub mod risk;
pub mod table;
pub mod treynor_black;
pub mod universe;
pub mod valuation;
