//! End-to-end runs of the analysis engine against an in-memory market.
//!
//! Tests cover:
//! - Inception NAV and weights for a single purchase
//! - Split-adjusted positions
//! - The additive NAV recurrence with income
//! - Strict versus permissive joins
//! - Class period rebasing
//! - Fatal data conditions
//! - Risk budget and Treynor-Black over a longer history

mod common;

use approx::assert_relative_eq;
use common::*;
use fundnav::domain::engine::{AnalysisEngine, FUND_COLUMN};
use fundnav::domain::error::FundError;
use fundnav::domain::market_data::{GapKind, JoinPolicy};
use fundnav::domain::risk::ACTIVE_PORTFOLIO;
use fundnav::domain::valuation::ReportingWindow;

mod inception {
    use super::*;

    #[test]
    fn nav_starts_at_initial_value() {
        let tx = vec![tx("2023-09-14", "ABC", 100.0, -5000.0)];
        let outcome = AnalysisEngine::new(sample_config())
            .run_with(&tx, &[], &sample_market())
            .unwrap();
        let report = &outcome.report;

        assert_eq!(report.nav.values, vec![338_400.0, 338_500.0, 338_350.0]);
        assert_eq!(report.start, date(2023, 9, 14));
        assert_eq!(report.end, date(2023, 9, 18));
        assert_eq!(report.window.label, "Inception to Date");
        assert_relative_eq!(report.fund_returns.values[0], 0.0);
        assert_relative_eq!(
            report.fund_returns.values[1],
            338_500.0 / 338_400.0 - 1.0,
            epsilon = 1e-12
        );
        assert!(outcome.gaps.is_empty());
        assert!(outcome.dropped_trades.is_empty());
    }

    #[test]
    fn cash_sweep_trades_do_not_create_positions() {
        let tx = vec![
            tx("2023-09-14", "ABC", 100.0, -5000.0),
            tx("2023-09-14", "NTPXX", 5000.0, 5000.0),
        ];
        let outcome = AnalysisEngine::new(sample_config())
            .run_with(&tx, &[], &sample_market())
            .unwrap();
        assert_eq!(outcome.report.universe, vec!["ABC", "VTI"]);
        assert_eq!(outcome.report.nav.values[0], 338_400.0);
    }

    #[test]
    fn weights_of_held_rows_sum_to_one() {
        let tx = vec![
            tx("2023-09-14", "ABC", 100.0, -5000.0),
            tx("2023-09-15", "VTI", 10.0, -2020.0),
        ];
        let outcome = AnalysisEngine::new(sample_config())
            .run_with(&tx, &[], &sample_market())
            .unwrap();
        let weights = &outcome.report.weights;
        for row in weights.rows() {
            let total: f64 = row.iter().sum();
            assert_relative_eq!(total, 1.0, epsilon = 1e-12);
        }
        let vti = weights.column_index("VTI").unwrap();
        assert_eq!(weights.get(0, vti), 0.0);
        assert!(weights.get(1, vti) > 0.0);
    }

    #[test]
    fn runs_are_repeatable() {
        let tx = vec![tx("2023-09-14", "ABC", 100.0, -5000.0)];
        let engine = AnalysisEngine::new(sample_config());
        let market = sample_market();
        let a = engine.run_with(&tx, &[], &market).unwrap();
        let b = engine.run_with(&tx, &[], &market).unwrap();
        assert_eq!(a.report.nav, b.report.nav);
        assert_eq!(a.report.positions, b.report.positions);
        assert_eq!(a.report.weights, b.report.weights);
        assert_eq!(a.report.universe, b.report.universe);
    }
}

mod positions {
    use super::*;

    #[test]
    fn two_for_one_split_doubles_earlier_purchase() {
        let mut config = sample_config();
        config.inception_date = date(2024, 1, 2);
        config.end_date = Some(date(2024, 1, 4));
        config.initial_value = 100_000.0;

        let market = MockMarketDataPort::new()
            .with_bars(
                "ABC",
                vec![
                    bar("2024-01-02", 50.0),
                    bar("2024-01-03", 51.0),
                    split_bar("2024-01-04", 52.0, 2.0),
                ],
            )
            .with_bars("VTI", generate_bars("2024-01-02", &[200.0, 201.0, 202.0]));
        let tx = vec![tx("2024-01-02", "ABC", 100.0, -10_000.0)];

        let outcome = AnalysisEngine::new(config).run_with(&tx, &[], &market).unwrap();
        let positions = &outcome.report.positions;
        let abc = positions.column_index("ABC").unwrap();
        for row in 0..positions.nrows() {
            assert_eq!(positions.get(row, abc), 200.0);
        }
        assert_eq!(outcome.report.nav.values, vec![100_000.0, 100_200.0, 100_400.0]);
    }

    #[test]
    fn sale_closes_position() {
        let tx = vec![
            tx("2023-09-14", "ABC", 100.0, -5000.0),
            tx("2023-09-18", "ABC", -100.0, 4950.0),
        ];
        let outcome = AnalysisEngine::new(sample_config())
            .run_with(&tx, &[], &sample_market())
            .unwrap();
        let positions = &outcome.report.positions;
        let abc = positions.column_index("ABC").unwrap();
        assert_eq!(positions.get(2, abc), 0.0);
        assert_eq!(outcome.report.nav.values[2], 338_350.0);
        assert!(outcome.report.holdings.is_empty());
    }

    #[test]
    fn weekend_trade_snaps_to_monday() {
        let tx = vec![
            tx("2023-09-14", "ABC", 100.0, -5000.0),
            tx("2023-09-16", "ABC", 10.0, -510.0),
        ];
        let outcome = AnalysisEngine::new(sample_config())
            .run_with(&tx, &[], &sample_market())
            .unwrap();
        let positions = &outcome.report.positions;
        let abc = positions.column_index("ABC").unwrap();
        assert_eq!(positions.get(1, abc), 100.0);
        assert_eq!(positions.get(2, abc), 110.0);
    }

    #[test]
    fn trade_after_end_is_dropped() {
        let tx = vec![
            tx("2023-09-14", "ABC", 100.0, -5000.0),
            tx("2023-09-25", "ABC", 50.0, -2500.0),
        ];
        let outcome = AnalysisEngine::new(sample_config())
            .run_with(&tx, &[], &sample_market())
            .unwrap();
        assert_eq!(outcome.dropped_trades.len(), 1);
        assert_eq!(outcome.dropped_trades[0].trade_date, date(2023, 9, 25));
        assert_eq!(outcome.summary().dropped_trades.len(), 1);
    }
}

mod nav {
    use super::*;

    #[test]
    fn nav_changes_by_market_value_cost_and_income() {
        let tx = vec![
            tx("2023-09-14", "ABC", 100.0, -5000.0),
            tx("2023-09-15", "ABC", 20.0, -1020.0),
        ];
        let inc = vec![income("2023-09-15", 12.5), income("2023-09-18", 7.0)];
        let outcome = AnalysisEngine::new(sample_config())
            .run_with(&tx, &inc, &sample_market())
            .unwrap();
        let report = &outcome.report;

        for i in 1..report.nav.len() {
            let s = &report.states[i];
            let prev = &report.states[i - 1];
            let expected = report.nav.values[i - 1] + (s.market_value - prev.market_value)
                + s.trade_cost
                + s.cash_income;
            assert_relative_eq!(report.nav.values[i], expected, epsilon = 1e-9);
        }
        assert_relative_eq!(report.nav.values[1], 338_400.0 + 120.0 * 51.0 - 6020.0 + 12.5);
    }

    #[test]
    fn class_period_rebases_to_its_initial_value() {
        let mut config = sample_config();
        config.window = ReportingWindow::ClassPeriod {
            label: "Fall 2023".into(),
            start: date(2023, 9, 15),
            end: None,
            initial_value: 1000.0,
        };
        let tx = vec![tx("2023-09-14", "ABC", 100.0, -5000.0)];
        let outcome = AnalysisEngine::new(config)
            .run_with(&tx, &[], &sample_market())
            .unwrap();
        let report = &outcome.report;
        assert_eq!(report.window.label, "Fall 2023");
        assert_eq!(report.start, date(2023, 9, 15));
        assert_eq!(report.nav.values, vec![1000.0, 850.0]);
        assert_relative_eq!(report.period_return(), -0.15, epsilon = 1e-12);
        assert_eq!(report.returns.nrows(), 1);
    }
}

mod joins {
    use super::*;

    fn market_with_gap() -> MockMarketDataPort {
        MockMarketDataPort::new()
            .with_bars("ABC", vec![bar("2023-09-14", 50.0), bar("2023-09-18", 49.5)])
            .with_bars(
                "VTI",
                vec![
                    bar("2023-09-14", 201.0),
                    bar("2023-09-15", 202.0),
                    bar("2023-09-18", 200.0),
                ],
            )
    }

    #[test]
    fn permissive_forward_fills_and_reports_gap() {
        let tx = vec![tx("2023-09-14", "ABC", 100.0, -5000.0)];
        let outcome = AnalysisEngine::new(sample_config())
            .run_with(&tx, &[], &market_with_gap())
            .unwrap();
        assert_eq!(outcome.report.nav.len(), 3);
        assert_eq!(outcome.report.nav.values[1], 338_400.0);
        assert!(outcome.gaps.iter().any(|g| g.ticker == "ABC"
            && g.kind == GapKind::PartialHistory { missing_days: 1 }));
    }

    #[test]
    fn strict_drops_dates_missing_a_close() {
        let mut config = sample_config();
        config.join_policy = JoinPolicy::Strict;
        let tx = vec![tx("2023-09-14", "ABC", 100.0, -5000.0)];
        let outcome = AnalysisEngine::new(config)
            .run_with(&tx, &[], &market_with_gap())
            .unwrap();
        assert_eq!(outcome.report.nav.dates, vec![date(2023, 9, 14), date(2023, 9, 18)]);
        assert_eq!(outcome.report.nav.values, vec![338_400.0, 338_350.0]);
        assert!(outcome.gaps.is_empty());
    }

    #[test]
    fn ticker_without_data_stays_in_universe_as_gap() {
        let tx = vec![
            tx("2023-09-14", "ABC", 100.0, -5000.0),
            tx("2023-09-14", "ZZZ", 10.0, -100.0),
        ];
        let outcome = AnalysisEngine::new(sample_config())
            .run_with(&tx, &[], &sample_market())
            .unwrap();
        assert!(outcome
            .gaps
            .iter()
            .any(|g| g.ticker == "ZZZ" && g.kind == GapKind::NoData));
    }

    #[test]
    fn provider_error_is_a_gap_not_a_failure() {
        let market = sample_market().with_error("DEF", "timeout");
        let tx = vec![
            tx("2023-09-14", "ABC", 100.0, -5000.0),
            tx("2023-09-14", "DEF", 1.0, -10.0),
        ];
        let outcome = AnalysisEngine::new(sample_config())
            .run_with(&tx, &[], &market)
            .unwrap();
        assert!(outcome
            .gaps
            .iter()
            .any(|g| g.ticker == "DEF" && matches!(g.kind, GapKind::ProviderError(_))));
    }
}

mod fatal {
    use super::*;

    #[test]
    fn missing_benchmark_aborts() {
        let market = MockMarketDataPort::new().with_bars(
            "ABC",
            vec![bar("2023-09-14", 50.0), bar("2023-09-15", 51.0)],
        );
        let tx = vec![tx("2023-09-14", "ABC", 100.0, -5000.0)];
        let err = AnalysisEngine::new(sample_config())
            .run_with(&tx, &[], &market)
            .unwrap_err();
        assert!(matches!(err, FundError::BenchmarkMissing { ticker } if ticker == "VTI"));
    }

    #[test]
    fn no_data_at_all_aborts() {
        let tx = vec![tx("2023-09-14", "ABC", 100.0, -5000.0)];
        let err = AnalysisEngine::new(sample_config())
            .run_with(&tx, &[], &MockMarketDataPort::new())
            .unwrap_err();
        assert!(matches!(err, FundError::NoValidTickers));
    }
}

mod analytics {
    use super::*;
    use fundnav::domain::engine::FundConfig;

    const DAYS: usize = 300;

    fn long_history() -> (FundConfig, MockMarketDataPort, Vec<TransactionRow>) {
        let abc = generate_bars("2023-01-02", &price_path(50.0, DAYS, 0.0008, 0.012, 0.0));
        let def = generate_bars("2023-01-02", &price_path(80.0, DAYS, 0.0003, 0.015, 1.3));
        let vti = generate_bars("2023-01-02", &price_path(200.0, DAYS, 0.0005, 0.008, 0.4));
        let end = vti[DAYS - 1].date;

        let mut config = FundConfig::new(date(2023, 1, 2), 100_000.0);
        config.end_date = Some(end);
        let tx = vec![
            tx("2023-01-02", "ABC", 400.0, -abc[0].close * 400.0),
            tx("2023-01-02", "DEF", 300.0, -def[0].close * 300.0),
        ];
        let market = MockMarketDataPort::new()
            .with_bars("ABC", abc)
            .with_bars("DEF", def)
            .with_bars("VTI", vti);
        (config, market, tx)
    }

    #[test]
    fn stats_and_regression_cover_fund_and_holdings() {
        let (config, market, tx) = long_history();
        let outcome = AnalysisEngine::new(config).run_with(&tx, &[], &market).unwrap();
        let report = &outcome.report;

        assert_eq!(report.returns.columns, vec![FUND_COLUMN, "ABC", "DEF", "VTI"]);
        assert_eq!(report.returns.nrows(), DAYS - 1);
        let mdd = report.performance.get("MDD", FUND_COLUMN).unwrap();
        assert!(mdd <= 0.0);
        let current = report.performance.get("CurrentDD", FUND_COLUMN).unwrap();
        assert!(current <= 0.0 && current >= mdd);
        let dd_days = report.performance.get("DaysDD>1%", FUND_COLUMN).unwrap();
        assert!(dd_days >= 0.0 && dd_days <= (DAYS - 1) as f64);
        assert!(report.performance.get("AnnStd", FUND_COLUMN).unwrap() > 0.0);
        assert!(report.regression.get(FUND_COLUMN, "beta").unwrap().is_finite());
        assert!(report.regression.get("VTI", "beta").is_none());
        assert!(report.weekly_alpha_beta.get("ABC", "alpha").unwrap().is_finite());
    }

    #[test]
    fn risk_budget_sums_to_one() {
        let (config, market, tx) = long_history();
        let outcome = AnalysisEngine::new(config).run_with(&tx, &[], &market).unwrap();
        let rb = outcome.report.risk_budget.as_ref().unwrap();
        assert_eq!(rb.holdings.len(), 2);
        let budget: f64 = rb.holdings.iter().map(|h| h.risk_budget).sum();
        assert_relative_eq!(budget, 1.0, epsilon = 1e-9);
        let weight: f64 = rb.holdings.iter().map(|h| h.weight).sum();
        assert_relative_eq!(weight, 1.0, epsilon = 1e-12);

        let table = rb.to_table();
        assert_eq!(table.get(ACTIVE_PORTFOLIO, "riskBudget"), Some(1.0));
    }

    #[test]
    fn treynor_black_weights_are_normalized() {
        let (config, market, tx) = long_history();
        let outcome = AnalysisEngine::new(config).run_with(&tx, &[], &market).unwrap();
        let tb = outcome.report.treynor_black.as_ref().unwrap();
        assert_eq!(tb.rows.len(), 2);
        let total: f64 = tb.rows.iter().map(|r| r.weight).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
        assert!(tb.rows[0].weight >= tb.rows[1].weight);
        assert!(tb.rows.iter().all(|r| r.months >= 12));
        assert_eq!(tb.covariance.nrows(), 2);

        let names: Vec<&str> = outcome.report.tables().into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"treynor_black_weights"));
        assert!(names.contains(&"risk_budget"));
    }

    #[test]
    fn treynor_black_unavailable_with_short_history() {
        let (mut config, market, tx) = long_history();
        config.treynor_black.min_months = 24;
        let outcome = AnalysisEngine::new(config).run_with(&tx, &[], &market).unwrap();
        assert!(outcome.report.treynor_black.is_none());
        assert!(outcome.notes.iter().any(|n| n.contains("Treynor-Black")));
    }

    #[test]
    fn treynor_black_targets_carry_current_weights() {
        let (config, market, tx) = long_history();
        let outcome = AnalysisEngine::new(config).run_with(&tx, &[], &market).unwrap();
        let report = &outcome.report;
        let last = report.weights.last_row().unwrap();
        let table = report.treynor_black.as_ref().unwrap().weights_table();

        for ticker in ["ABC", "DEF"] {
            let col = report.weights.columns.iter().position(|c| c == ticker).unwrap();
            let current = table.get(ticker, "currentWeight").unwrap();
            assert_relative_eq!(current, last[col], epsilon = 1e-12);
            assert!(current > 0.0);
            let target = table.get(ticker, "weight").unwrap();
            assert_relative_eq!(table.get(ticker, "weightDiff").unwrap(), target - current, epsilon = 1e-12);
        }
    }

    #[test]
    fn ticker_without_data_reported_once() {
        let (config, market, mut trades) = long_history();
        trades.push(tx("2023-01-03", "ZZZ", 10.0, -100.0));
        let outcome = AnalysisEngine::new(config).run_with(&trades, &[], &market).unwrap();
        assert!(outcome.report.treynor_black.is_some());
        let zzz: Vec<_> = outcome.gaps.iter().filter(|g| g.ticker == "ZZZ").collect();
        assert_eq!(zzz.len(), 1);
        assert_eq!(zzz[0].kind, GapKind::NoData);
    }
}
