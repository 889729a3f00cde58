//! Configuration validation.
//!
//! Validates every fund and analysis field before a run starts.

use crate::domain::error::FundError;
use crate::domain::market_data::JoinPolicy;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

/// Longest price history fetched ahead of the window start.
pub const MAX_PRICE_LOOKBACK_DAYS: i64 = 366;
pub const MAX_TB_LOOKBACK_YEARS: i64 = 50;

pub fn validate_fund_config(config: &dyn ConfigPort) -> Result<(), FundError> {
    let inception = validate_inception(config)?;
    validate_initial_value(config)?;
    validate_benchmark(config)?;
    validate_end_date(config, inception)?;
    validate_annualization(config)?;
    validate_join_policy(config)?;
    validate_min_obs(config)?;
    validate_lookback(config)?;
    validate_class_period(config)?;
    validate_treynor_black(config)?;
    Ok(())
}

/// Reads a non-blank string value.
pub fn non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn parse_date(section: &str, key: &str, value: &str) -> Result<NaiveDate, FundError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| invalid(
        section,
        key,
        format!("invalid {key} format, expected YYYY-MM-DD"),
    ))
}

/// An optional date key; blank counts as absent.
pub fn optional_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, FundError> {
    non_empty(config, section, key)
        .map(|v| parse_date(section, key, &v))
        .transpose()
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> FundError {
    FundError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_inception(config: &dyn ConfigPort) -> Result<NaiveDate, FundError> {
    match non_empty(config, "fund", "inception_date") {
        None => Err(FundError::ConfigMissing {
            section: "fund".to_string(),
            key: "inception_date".to_string(),
        }),
        Some(s) => parse_date("fund", "inception_date", &s),
    }
}

fn validate_initial_value(config: &dyn ConfigPort) -> Result<(), FundError> {
    let value = config.get_double("fund", "initial_value", 0.0);
    if value <= 0.0 {
        return Err(invalid("fund", "initial_value", "initial_value must be positive"));
    }
    Ok(())
}

fn validate_benchmark(config: &dyn ConfigPort) -> Result<(), FundError> {
    let benchmark = non_empty(config, "analysis", "benchmark").unwrap_or_else(|| "VTI".to_string());
    let cash = non_empty(config, "fund", "cash_ticker").unwrap_or_else(|| "NTPXX".to_string());
    if benchmark.eq_ignore_ascii_case(&cash) {
        return Err(invalid(
            "analysis",
            "benchmark",
            "benchmark must differ from the cash ticker",
        ));
    }
    Ok(())
}

fn validate_end_date(config: &dyn ConfigPort, inception: NaiveDate) -> Result<(), FundError> {
    if let Some(end) = optional_date(config, "analysis", "end_date")? {
        if end < inception {
            return Err(invalid(
                "analysis",
                "end_date",
                "end_date must not be before inception_date",
            ));
        }
    }
    Ok(())
}

fn validate_annualization(config: &dyn ConfigPort) -> Result<(), FundError> {
    let value = config.get_double("analysis", "annualization", 252.0);
    if value <= 0.0 {
        return Err(invalid("analysis", "annualization", "annualization must be positive"));
    }
    Ok(())
}

fn validate_join_policy(config: &dyn ConfigPort) -> Result<(), FundError> {
    if let Some(raw) = non_empty(config, "analysis", "join_policy") {
        raw.parse::<JoinPolicy>()
            .map_err(|reason| invalid("analysis", "join_policy", reason))?;
    }
    Ok(())
}

fn validate_min_obs(config: &dyn ConfigPort) -> Result<(), FundError> {
    let value = config.get_int("analysis", "min_regression_obs", 5);
    if value < 3 {
        return Err(invalid(
            "analysis",
            "min_regression_obs",
            "min_regression_obs must be at least 3",
        ));
    }
    Ok(())
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), FundError> {
    let value = config.get_int("analysis", "price_lookback_days", 14);
    if !(1..=MAX_PRICE_LOOKBACK_DAYS).contains(&value) {
        return Err(invalid(
            "analysis",
            "price_lookback_days",
            format!("price_lookback_days must be between 1 and {MAX_PRICE_LOOKBACK_DAYS}"),
        ));
    }
    Ok(())
}

fn validate_class_period(config: &dyn ConfigPort) -> Result<(), FundError> {
    let Some(start) = optional_date(config, "class_period", "start_date")? else {
        return Ok(());
    };
    if let Some(end) = optional_date(config, "class_period", "end_date")? {
        if end < start {
            return Err(invalid(
                "class_period",
                "end_date",
                "end_date must not be before start_date",
            ));
        }
    }
    if config.get_string("class_period", "initial_value").is_some()
        && config.get_double("class_period", "initial_value", 0.0) <= 0.0
    {
        return Err(invalid(
            "class_period",
            "initial_value",
            "initial_value must be positive",
        ));
    }
    Ok(())
}

fn validate_treynor_black(config: &dyn ConfigPort) -> Result<(), FundError> {
    if !(1..=MAX_TB_LOOKBACK_YEARS).contains(&config.get_int("treynor_black", "lookback_years", 5)) {
        return Err(invalid(
            "treynor_black",
            "lookback_years",
            format!("lookback_years must be between 1 and {MAX_TB_LOOKBACK_YEARS}"),
        ));
    }
    if config.get_int("treynor_black", "min_months", 12) < 3 {
        return Err(invalid(
            "treynor_black",
            "min_months",
            "min_months must be at least 3",
        ));
    }
    Ok(())
}
