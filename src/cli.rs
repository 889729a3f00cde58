//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_ledger_adapter::CsvLedgerAdapter;
use crate::adapters::csv_market_adapter::CsvMarketAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{non_empty, optional_date, parse_date, validate_fund_config};
use crate::domain::engine::{AnalysisEngine, AnalysisOutcome, FUND_COLUMN, FundConfig, TreynorBlackConfig};
use crate::domain::error::FundError;
use crate::domain::market_data::JoinPolicy;
use crate::domain::universe::Universe;
use crate::domain::valuation::ReportingWindow;
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "fundnav", about = "Fund NAV reconstruction and risk attribution")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Ledger and price locations; each overrides the `[data]` section.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct DataArgs {
    #[arg(long)]
    pub transactions: Option<PathBuf>,
    #[arg(long)]
    pub income: Option<PathBuf>,
    #[arg(long)]
    pub prices: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconstruct NAV and run the analytics
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        data: DataArgs,
        #[arg(short, long, default_value = "report")]
        output: PathBuf,
        /// strict or permissive
        #[arg(long)]
        join_policy: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
        /// Report from inception even when a class period is configured
        #[arg(long)]
        inception_to_date: bool,
    },
    /// Validate a fund configuration and its ledgers
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        data: DataArgs,
    },
    /// List the instrument universe derived from the transaction ledger
    Tickers {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        data: DataArgs,
    },
    /// Show price data coverage per ticker
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        data: DataArgs,
        #[arg(long)]
        ticker: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Analyze {
            config,
            data,
            output,
            join_policy,
            end_date,
            inception_to_date,
        } => run_analyze(
            &config,
            &data,
            &output,
            join_policy.as_deref(),
            end_date.as_deref(),
            inception_to_date,
        ),
        Command::Validate { config, data } => run_validate(&config, &data),
        Command::Tickers { config, data } => run_tickers(&config, &data),
        Command::Info {
            config,
            data,
            ticker,
        } => run_info(&config, &data, ticker.as_deref()),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = FundError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: FundError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

/// Builds the typed run configuration. Validates first.
pub fn build_fund_config(config: &dyn ConfigPort) -> Result<FundConfig, FundError> {
    validate_fund_config(config)?;

    let inception = match non_empty(config, "fund", "inception_date") {
        Some(s) => parse_date("fund", "inception_date", &s)?,
        None => {
            return Err(FundError::ConfigMissing {
                section: "fund".into(),
                key: "inception_date".into(),
            });
        }
    };
    let initial_value = config.get_double("fund", "initial_value", 0.0);
    let mut fund = FundConfig::new(inception, initial_value);

    if let Some(cash) = non_empty(config, "fund", "cash_ticker") {
        fund.cash_ticker = cash.to_uppercase();
    }
    if let Some(benchmark) = non_empty(config, "analysis", "benchmark") {
        fund.benchmark = benchmark.to_uppercase();
    }
    fund.end_date = optional_date(config, "analysis", "end_date")?;
    fund.annualization = config.get_double("analysis", "annualization", fund.annualization);
    if let Some(policy) = non_empty(config, "analysis", "join_policy") {
        fund.join_policy = policy.parse::<JoinPolicy>().map_err(|reason| FundError::ConfigInvalid {
            section: "analysis".into(),
            key: "join_policy".into(),
            reason,
        })?;
    }
    fund.min_regression_obs = config.get_int("analysis", "min_regression_obs", 5).max(3) as usize;
    fund.price_lookback_days = config.get_int("analysis", "price_lookback_days", 14);

    if config.has_section("class_period") {
        if let Some(start) = optional_date(config, "class_period", "start_date")? {
            fund.window = ReportingWindow::ClassPeriod {
                label: non_empty(config, "class_period", "label")
                    .unwrap_or_else(|| "Class Period".to_string()),
                start,
                end: optional_date(config, "class_period", "end_date")?,
                initial_value: config.get_double("class_period", "initial_value", initial_value),
            };
        }
    }

    if !config.has_section("treynor_black") {
        return Ok(fund);
    }
    let defaults = TreynorBlackConfig::default();
    fund.treynor_black = TreynorBlackConfig {
        enabled: config.get_bool("treynor_black", "enabled", defaults.enabled),
        lookback_years: config
            .get_int("treynor_black", "lookback_years", defaults.lookback_years as i64)
            .max(1) as u32,
        min_months: config
            .get_int("treynor_black", "min_months", defaults.min_months as i64)
            .max(3) as usize,
    };
    Ok(fund)
}

/// Data locations: CLI flags win, then `[data]` keys resolved against the
/// config file's directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPaths {
    pub transactions: PathBuf,
    pub income: Option<PathBuf>,
    pub prices: PathBuf,
}

pub fn resolve_data_paths(
    config: &dyn ConfigPort,
    config_path: &Path,
    args: &DataArgs,
) -> Result<DataPaths, FundError> {
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    let from_config = |key: &str| non_empty(config, "data", key).map(|v| base.join(v));

    let transactions = args
        .transactions
        .clone()
        .or_else(|| from_config("transactions"))
        .ok_or_else(|| FundError::ConfigMissing {
            section: "data".into(),
            key: "transactions".into(),
        })?;
    let income = args.income.clone().or_else(|| from_config("income"));
    let prices = args
        .prices
        .clone()
        .or_else(|| from_config("prices_dir"))
        .ok_or_else(|| FundError::ConfigMissing {
            section: "data".into(),
            key: "prices_dir".into(),
        })?;
    Ok(DataPaths {
        transactions,
        income,
        prices,
    })
}

fn run_analyze(
    config_path: &Path,
    data: &DataArgs,
    output: &Path,
    join_policy: Option<&str>,
    end_date: Option<&str>,
    inception_to_date: bool,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let mut fund = match build_fund_config(&adapter) {
        Ok(f) => f,
        Err(e) => return fail(e),
    };

    if let Some(policy) = join_policy {
        match policy.parse::<JoinPolicy>() {
            Ok(p) => fund.join_policy = p,
            Err(reason) => {
                return fail(FundError::ConfigInvalid {
                    section: "analysis".into(),
                    key: "join_policy".into(),
                    reason,
                });
            }
        }
    }
    if let Some(end) = end_date {
        match parse_date("analysis", "end_date", end) {
            Ok(d) => fund.end_date = Some(d),
            Err(e) => return fail(e),
        }
    }
    if inception_to_date {
        fund.window = ReportingWindow::InceptionToDate;
    }

    let paths = match resolve_data_paths(&adapter, config_path, data) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let ledger = CsvLedgerAdapter::new(paths.transactions, paths.income);
    let market = CsvMarketAdapter::new(paths.prices);

    eprintln!(
        "Analyzing fund from {} (benchmark {}, {} join)",
        fund.inception_date, fund.benchmark, fund.join_policy
    );
    let engine = AnalysisEngine::new(fund);
    let outcome = match engine.run(&ledger, &market) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };

    print_summary(&outcome);

    if let Err(e) = CsvReportAdapter::new().write(&outcome, output) {
        return fail(e);
    }
    eprintln!("\nReport written to: {}", output.display());
    ExitCode::SUCCESS
}

fn print_summary(outcome: &AnalysisOutcome) {
    let report = &outcome.report;
    eprintln!("\n=== {} ===", report.window.label);
    eprintln!("Period:           {} to {}", report.start, report.end);
    eprintln!("Trading Days:     {}", report.nav.len());
    if let Some(nav) = report.final_nav() {
        eprintln!("Final NAV:        {nav:.2}");
    }
    eprintln!("Period Return:    {:.2}%", report.period_return() * 100.0);
    let stat = |row: &str| report.performance.get(row, FUND_COLUMN).unwrap_or(f64::NAN);
    eprintln!("Ann. Return:      {:.2}%", stat("AnnRtn") * 100.0);
    eprintln!("Ann. Volatility:  {:.2}%", stat("AnnStd") * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", stat("Sharpe"));
    eprintln!("Max Drawdown:     {:.1}%", stat("MDD") * 100.0);
    eprintln!("Current Drawdown: {:.1}%", stat("CurrentDD") * 100.0);
    if let Some(beta) = report.regression.get(FUND_COLUMN, "beta") {
        eprintln!("Beta:             {beta:.2}");
    }
    eprintln!("Holdings:         {}", report.holdings.len());

    if !outcome.gaps.is_empty() {
        eprintln!("\n=== Data Gaps ===");
        for gap in &outcome.gaps {
            eprintln!("  {}: {}", gap.ticker, gap.kind);
        }
    }
    if !outcome.dropped_trades.is_empty() {
        eprintln!(
            "\nwarning: {} trade(s) after the reporting period were dropped",
            outcome.dropped_trades.len()
        );
    }
    for note in &outcome.notes {
        eprintln!("note: {note}");
    }
}

fn run_validate(config_path: &Path, data: &DataArgs) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let fund = match build_fund_config(&adapter) {
        Ok(f) => f,
        Err(e) => return fail(e),
    };
    eprintln!("Config validated successfully");
    eprintln!("  inception:   {}", fund.inception_date);
    eprintln!("  initial:     {:.2}", fund.initial_value);
    eprintln!("  benchmark:   {}", fund.benchmark);
    eprintln!("  join policy: {}", fund.join_policy);
    match &fund.window {
        ReportingWindow::InceptionToDate => eprintln!("  window:      inception to date"),
        ReportingWindow::ClassPeriod { label, start, .. } => {
            eprintln!("  window:      {label} from {start}")
        }
    }

    let paths = match resolve_data_paths(&adapter, config_path, data) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let ledger = CsvLedgerAdapter::new(paths.transactions, paths.income);
    let transactions = match ledger.transactions() {
        Ok(t) => t,
        Err(e) => return fail(e),
    };
    let income = match ledger.income() {
        Ok(i) => i,
        Err(e) => return fail(e),
    };
    eprintln!(
        "Ledgers readable: {} transaction rows, {} income rows",
        transactions.len(),
        income.len()
    );
    ExitCode::SUCCESS
}

fn load_universe_args(
    config_path: &Path,
    data: &DataArgs,
) -> Result<(FundConfig, Universe, CsvMarketAdapter), ExitCode> {
    let adapter = load_config(config_path)?;
    let fund = build_fund_config(&adapter).map_err(fail)?;
    let paths = resolve_data_paths(&adapter, config_path, data).map_err(fail)?;
    let ledger = CsvLedgerAdapter::new(paths.transactions, paths.income);
    let transactions = ledger.transactions().map_err(fail)?;
    let universe = Universe::from_transactions(&transactions, &fund.cash_ticker, &fund.benchmark);
    Ok((fund, universe, CsvMarketAdapter::new(paths.prices)))
}

fn run_tickers(config_path: &Path, data: &DataArgs) -> ExitCode {
    let (_, universe, market) = match load_universe_args(config_path, data) {
        Ok(v) => v,
        Err(code) => return code,
    };
    let available = match market.available_tickers() {
        Ok(a) => a,
        Err(e) => return fail(e),
    };
    for ticker in &universe.tickers {
        let role = if *ticker == universe.benchmark { " (benchmark)" } else { "" };
        let status = if available.contains(ticker) { "prices" } else { "no price file" };
        println!("{ticker}{role}: {status}");
    }
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path, data: &DataArgs, ticker: Option<&str>) -> ExitCode {
    let (fund, universe, market) = match load_universe_args(config_path, data) {
        Ok(v) => v,
        Err(code) => return code,
    };
    let tickers: Vec<String> = match ticker {
        Some(t) => vec![t.to_uppercase()],
        None => universe.tickers.clone(),
    };
    let start = NaiveDate::MIN;
    let end = fund.resolved_end();

    for t in &tickers {
        match market.fetch(t, start, end) {
            Ok(Some(bars)) if !bars.is_empty() => {
                let first = bars[0].date;
                let last = bars[bars.len() - 1].date;
                let splits = bars.iter().filter(|b| b.split_ratio != 0.0).count();
                let dividends = bars.iter().filter(|b| b.dividend != 0.0).count();
                println!(
                    "{}: {} bars, {} to {} ({} dividends, {} splits)",
                    t,
                    bars.len(),
                    first,
                    last,
                    dividends,
                    splits
                );
            }
            Ok(_) => eprintln!("{t}: no data found"),
            Err(e) => eprintln!("error querying {t}: {e}"),
        }
    }
    ExitCode::SUCCESS
}
