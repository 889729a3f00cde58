//! Analysis engine: runs normalization, ledger alignment, positions,
//! valuation and analytics for one reporting window.

use chrono::{Local, Months, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::calendar::{BusinessCalendar, format_date};
use crate::domain::error::FundError;
use crate::domain::frame::{Frame, TimeSeries};
use crate::domain::ledger::{
    IncomeRow, TradeRecord, TransactionRow, aggregate_trades, align_trades, income_series,
    trade_cost_series,
};
use crate::domain::market_data::{DataGap, JoinPolicy, MarketPanel, derive_bars};
use crate::domain::metrics::{
    TRADING_DAYS_PER_YEAR, drawdown_frame, growth_frame, performance_table,
};
use crate::domain::position::PositionBook;
use crate::domain::regression::{regression_table, weekly_alpha_beta};
use crate::domain::returns::{Period, compound_by_period};
use crate::domain::risk::RiskBudget;
use crate::domain::table::Table;
use crate::domain::treynor_black::TreynorBlack;
use crate::domain::universe::{Universe, fetch_all, load_universe};
use crate::domain::valuation::{
    PortfolioState, ReportingWindow, Valuation, WindowBounds, fund_returns, rebase_nav,
    states_table,
};
use crate::ports::ledger_port::LedgerPort;
use crate::ports::market_data_port::MarketDataPort;

pub const FUND_COLUMN: &str = "Fund";

#[derive(Debug, Clone, PartialEq)]
pub struct TreynorBlackConfig {
    pub enabled: bool,
    pub lookback_years: u32,
    pub min_months: usize,
}

impl Default for TreynorBlackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookback_years: 5,
            min_months: 12,
        }
    }
}

/// Everything a run needs besides its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct FundConfig {
    pub inception_date: NaiveDate,
    pub initial_value: f64,
    pub cash_ticker: String,
    pub benchmark: String,
    /// Defaults to today.
    pub end_date: Option<NaiveDate>,
    pub annualization: f64,
    pub join_policy: JoinPolicy,
    pub min_regression_obs: usize,
    pub price_lookback_days: i64,
    pub window: ReportingWindow,
    pub treynor_black: TreynorBlackConfig,
}

impl FundConfig {
    pub fn new(inception_date: NaiveDate, initial_value: f64) -> Self {
        Self {
            inception_date,
            initial_value,
            cash_ticker: "NTPXX".to_string(),
            benchmark: "VTI".to_string(),
            end_date: None,
            annualization: TRADING_DAYS_PER_YEAR,
            join_policy: JoinPolicy::default(),
            min_regression_obs: 5,
            price_lookback_days: 14,
            window: ReportingWindow::InceptionToDate,
            treynor_black: TreynorBlackConfig::default(),
        }
    }

    pub fn resolved_end(&self) -> NaiveDate {
        self.end_date.unwrap_or_else(|| Local::now().date_naive())
    }
}

/// Every derived series for the reporting window.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub window: WindowBounds,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub universe: Vec<String>,
    pub holdings: Vec<String>,
    pub positions: Frame,
    pub market_values: Frame,
    pub weights: Frame,
    pub states: Vec<PortfolioState>,
    pub nav: TimeSeries,
    pub fund_returns: TimeSeries,
    /// Fund plus every ticker, first window row dropped.
    pub returns: Frame,
    pub growth: Frame,
    pub drawdown: Frame,
    pub performance: Table,
    pub holding_performance: Table,
    pub regression: Table,
    pub weekly_alpha_beta: Table,
    pub risk_budget: Option<RiskBudget>,
    pub treynor_black: Option<TreynorBlack>,
    pub trade_costs: TimeSeries,
}

impl AnalysisReport {
    /// Exported tables by name, in a fixed order.
    pub fn tables(&self) -> Vec<(&'static str, Table)> {
        let mut tables = vec![
            ("positions", self.positions.to_table("Date")),
            ("market_values", self.market_values.to_table("Date")),
            ("weights", self.weights.to_table("Date")),
            ("portfolio_state", states_table(&self.states)),
            ("nav", self.nav.to_table("Date", "NAV")),
            ("returns", self.returns.to_table("Date")),
            ("growth", self.growth.to_table("Date")),
            ("drawdown", self.drawdown.to_table("Date")),
            ("performance_stats", self.performance.clone()),
            ("holding_performance", self.holding_performance.clone()),
            ("benchmark_regression", self.regression.clone()),
            ("weekly_alpha_beta", self.weekly_alpha_beta.clone()),
        ];
        if let Some(rb) = &self.risk_budget {
            tables.push(("risk_budget", rb.to_table()));
        }
        if let Some(tb) = &self.treynor_black {
            tables.push(("treynor_black_weights", tb.weights_table()));
            tables.push(("treynor_black_covariance", tb.covariance.clone()));
        }
        tables.push(("trade_costs", self.trade_costs.to_table("Date", "Cost")));
        tables
    }

    pub fn final_nav(&self) -> Option<f64> {
        self.nav.last()
    }

    /// Compounded fund return over the window.
    pub fn period_return(&self) -> f64 {
        self.fund_returns.values.iter().map(|r| 1.0 + r).product::<f64>() - 1.0
    }
}

/// A report plus everything that degraded along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub report: AnalysisReport,
    pub gaps: Vec<DataGap>,
    pub dropped_trades: Vec<TradeRecord>,
    /// Sections that could not be computed and why.
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GapSummary {
    pub ticker: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DroppedTradeSummary {
    pub trade_date: String,
    pub ticker: String,
    pub quantity: f64,
    pub principal: f64,
}

/// Run metadata written alongside the tables.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub window: String,
    pub start: String,
    pub end: String,
    pub trading_days: usize,
    pub final_nav: Option<f64>,
    pub period_return: f64,
    pub universe: Vec<String>,
    pub holdings: Vec<String>,
    pub gaps: Vec<GapSummary>,
    pub dropped_trades: Vec<DroppedTradeSummary>,
    pub notes: Vec<String>,
    pub tables: Vec<String>,
}

impl AnalysisOutcome {
    pub fn summary(&self) -> RunSummary {
        let r = &self.report;
        RunSummary {
            window: r.window.label.clone(),
            start: format_date(r.start),
            end: format_date(r.end),
            trading_days: r.nav.len(),
            final_nav: r.final_nav(),
            period_return: r.period_return(),
            universe: r.universe.clone(),
            holdings: r.holdings.clone(),
            gaps: self
                .gaps
                .iter()
                .map(|g| GapSummary {
                    ticker: g.ticker.clone(),
                    reason: g.kind.to_string(),
                })
                .collect(),
            dropped_trades: self
                .dropped_trades
                .iter()
                .map(|t| DroppedTradeSummary {
                    trade_date: format_date(t.trade_date),
                    ticker: t.ticker.clone(),
                    quantity: t.quantity,
                    principal: t.principal,
                })
                .collect(),
            notes: self.notes.clone(),
            tables: r.tables().iter().map(|(name, _)| name.to_string()).collect(),
        }
    }
}

pub struct AnalysisEngine {
    config: FundConfig,
}

impl AnalysisEngine {
    pub fn new(config: FundConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FundConfig {
        &self.config
    }

    pub fn run(
        &self,
        ledger: &dyn LedgerPort,
        market: &dyn MarketDataPort,
    ) -> Result<AnalysisOutcome, FundError> {
        let transactions = ledger.transactions()?;
        let income = ledger.income()?;
        self.run_with(&transactions, &income, market)
    }

    pub fn run_with(
        &self,
        transactions: &[TransactionRow],
        income: &[IncomeRow],
        market: &dyn MarketDataPort,
    ) -> Result<AnalysisOutcome, FundError> {
        let cfg = &self.config;
        let start = cfg.inception_date;
        let end = cfg.resolved_end();
        let calendar = BusinessCalendar::weekdays(start, end);
        if calendar.is_empty() {
            return Err(FundError::EmptyCalendar { start, end });
        }

        let universe = Universe::from_transactions(transactions, &cfg.cash_ticker, &cfg.benchmark);
        info!(tickers = universe.count(), start = %start, end = %end, "starting analysis");

        let fetch_start = chrono::Duration::try_days(cfg.price_lookback_days)
            .and_then(|lookback| start.checked_sub_signed(lookback))
            .ok_or_else(|| FundError::ConfigInvalid {
                section: "analysis".into(),
                key: "price_lookback_days".into(),
                reason: format!(
                    "lookback of {} days before {start} is out of range",
                    cfg.price_lookback_days
                ),
            })?;
        let loaded = load_universe(market, &universe, &calendar, fetch_start, end)?;
        let mut gaps = loaded.gaps;

        let assembly = MarketPanel::assemble(&calendar, loaded.series, cfg.join_policy);
        gaps.extend(assembly.gaps);
        let panel = assembly.panel;
        if panel.calendar.is_empty() {
            return Err(FundError::EmptyCalendar { start, end });
        }

        let records = aggregate_trades(transactions, &cfg.cash_ticker);
        let alignment = align_trades(&records, &panel.calendar);
        let book = PositionBook::reconstruct(
            &alignment,
            panel.calendar.dates(),
            &panel.tickers,
            &panel.split_factor,
        );
        let costs = trade_cost_series(&alignment, &panel.calendar);
        let cash = income_series(income, &panel.calendar);
        let valuation = Valuation::compute(
            &book.positions,
            &panel.close,
            &costs,
            &cash,
            cfg.initial_value,
            start,
        );

        let window = cfg.window.resolve(&panel.calendar).ok_or_else(|| match &cfg.window {
            ReportingWindow::ClassPeriod { label, .. } => FundError::ConfigInvalid {
                section: "class_period".into(),
                key: "end_date".into(),
                reason: format!(
                    "class period '{label}' has no trading days between {} and {}",
                    format_date(panel.calendar.dates()[0]),
                    format_date(panel.calendar.dates()[panel.calendar.len() - 1]),
                ),
            },
            ReportingWindow::InceptionToDate => FundError::EmptyCalendar { start, end },
        })?;
        let range = window.range();
        let nav = match window.initial_value {
            Some(iv) => rebase_nav(&valuation.nav.slice(range.clone()), iv),
            None => valuation.nav.slice(range.clone()),
        };
        let window_returns = fund_returns(&nav);
        let weights = valuation.weights.slice_rows(range.clone());

        let holdings: Vec<String> = match weights.last_row() {
            Some(last) => weights
                .columns
                .iter()
                .zip(last)
                .filter(|(t, w)| **t != cfg.benchmark && **w != 0.0)
                .map(|(t, _)| t.clone())
                .collect(),
            None => Vec::new(),
        };

        let returns = combined_returns(&window_returns, &panel.returns.slice_rows(range.clone()));
        let mut notes = Vec::new();

        let performance = performance_table(&returns, cfg.annualization);
        let mut held_columns = vec![FUND_COLUMN.to_string()];
        held_columns.extend(holdings.iter().cloned());
        held_columns.push(cfg.benchmark.clone());
        let holding_performance = performance_table(&returns.select_columns(&held_columns), cfg.annualization);

        let regression = regression_table(&returns, &cfg.benchmark, cfg.min_regression_obs)?;
        if regression.get(FUND_COLUMN, "alpha").is_none_or(f64::is_nan) {
            notes.push(format!(
                "benchmark regression unavailable: fewer than {} usable observations",
                cfg.min_regression_obs
            ));
        }
        let weekly = weekly_alpha_beta(&returns, &holdings, &cfg.benchmark, cfg.min_regression_obs)?;

        let last_weights: Vec<(String, f64)> = match weights.last_row() {
            Some(last) => weights.columns.iter().cloned().zip(last.iter().copied()).collect(),
            None => Vec::new(),
        };
        let ticker_returns = returns.select_columns(&panel.tickers);
        let risk_budget =
            match RiskBudget::compute(&ticker_returns, &last_weights, &cfg.benchmark, cfg.annualization) {
                Ok(rb) => Some(rb),
                Err(e) => {
                    warn!(error = %e, "risk budget unavailable");
                    notes.push(format!("risk budget unavailable: {e}"));
                    None
                }
            };

        let treynor_black = if cfg.treynor_black.enabled {
            match self.treynor_black(market, &universe, end) {
                Ok(mut tb) => {
                    tb.apply_current_weights(&last_weights);
                    for gap in &tb.gaps {
                        if !gaps.iter().any(|g| g.ticker == gap.ticker) {
                            gaps.push(gap.clone());
                        }
                    }
                    Some(tb)
                }
                Err(e) => {
                    warn!(error = %e, "Treynor-Black model unavailable");
                    notes.push(format!("Treynor-Black model unavailable: {e}"));
                    None
                }
            }
        } else {
            None
        };

        let window_dates = &panel.calendar.dates()[range.clone()];
        let report = AnalysisReport {
            start: window_dates[0],
            end: window_dates[window_dates.len() - 1],
            window,
            universe: universe.tickers.clone(),
            holdings,
            positions: book.positions.slice_rows(range.clone()),
            market_values: valuation.market_values.slice_rows(range.clone()),
            weights,
            states: valuation.states[range.clone()].to_vec(),
            nav,
            fund_returns: window_returns,
            growth: growth_frame(&returns),
            drawdown: drawdown_frame(&returns),
            returns,
            performance,
            holding_performance,
            regression,
            weekly_alpha_beta: weekly,
            risk_budget,
            treynor_black,
            trade_costs: costs.slice(range),
        };

        info!(
            days = report.nav.len(),
            final_nav = report.final_nav().unwrap_or(f64::NAN),
            gaps = gaps.len(),
            "analysis complete"
        );
        Ok(AnalysisOutcome {
            report,
            gaps,
            dropped_trades: alignment.dropped,
            notes,
        })
    }

    /// Monthly model over its own lookback, ending at the run end.
    fn treynor_black(
        &self,
        market: &dyn MarketDataPort,
        universe: &Universe,
        end: NaiveDate,
    ) -> Result<TreynorBlack, FundError> {
        let cfg = &self.config;
        let months = cfg.treynor_black.lookback_years.saturating_mul(12);
        let start = end
            .checked_sub_months(Months::new(months))
            .unwrap_or(cfg.inception_date);

        let mut tickers: Vec<String> = universe.holdings().cloned().collect();
        tickers.push(universe.benchmark.clone());
        let fetched = fetch_all(market, &tickers, start, end);

        let mut benchmark = None;
        let mut candidates = Vec::new();
        for (ticker, bars) in fetched.bars {
            let derived = derive_bars(&bars);
            let dates: Vec<NaiveDate> = derived.iter().map(|b| b.date).collect();
            let daily: Vec<f64> = derived.iter().map(|b| b.total_return).collect();
            let monthly = compound_by_period(&dates, &daily, Period::Monthly);
            if ticker == universe.benchmark {
                benchmark = Some(monthly);
            } else {
                candidates.push((ticker, monthly));
            }
        }
        let benchmark = benchmark.unwrap_or_else(|| TimeSeries::new(Vec::new(), Vec::new()));
        TreynorBlack::compute(&candidates, &benchmark, cfg.treynor_black.min_months)
    }
}

/// Fund returns followed by every ticker's returns, first row dropped.
fn combined_returns(fund: &TimeSeries, tickers: &Frame) -> Frame {
    let mut columns = vec![FUND_COLUMN.to_string()];
    columns.extend(tickers.columns.iter().cloned());
    let rows: Vec<Vec<f64>> = (1..fund.len())
        .map(|i| {
            let mut row = vec![fund.values[i]];
            row.extend_from_slice(tickers.row(i));
            row
        })
        .collect();
    let dates = fund.dates.get(1..).map(|d| d.to_vec()).unwrap_or_default();
    Frame::from_rows(dates, columns, rows)
}
