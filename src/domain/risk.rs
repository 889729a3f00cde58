//! Active risk budget: how much each holding contributes to the volatility
//! of the current portfolio.

use tracing::debug;

use super::error::FundError;
use super::frame::Frame;
use super::regression::{correlation, sample_std};
use super::table::Table;

pub const ACTIVE_PORTFOLIO: &str = "activeP";

pub const RISK_COLUMNS: [&str; 10] = [
    "weight",
    "vol",
    "wtdVol",
    "corr",
    "MRC",
    "beta",
    "riskBudget",
    "riskImpact",
    "sumWtdVol",
    "DV",
];

#[derive(Debug, Clone, PartialEq)]
pub struct RiskContribution {
    pub ticker: String,
    pub weight: f64,
    pub vol: f64,
    pub weighted_vol: f64,
    pub corr: f64,
    pub marginal: f64,
    pub beta: f64,
    pub risk_budget: f64,
    pub risk_impact: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskBudget {
    pub holdings: Vec<RiskContribution>,
    pub portfolio_risk: f64,
    pub sum_weighted_vol: f64,
    pub diversification: f64,
}

impl RiskBudget {
    /// `returns` holds daily ticker returns; `weights` the last row of
    /// portfolio weights keyed by ticker. Holdings with zero weight and the
    /// benchmark are left out; the rest are renormalized to sum to 1.
    pub fn compute(
        returns: &Frame,
        weights: &[(String, f64)],
        benchmark: &str,
        scale: f64,
    ) -> Result<Self, FundError> {
        let active: Vec<(usize, &str, f64)> = weights
            .iter()
            .filter(|(t, w)| t != benchmark && *w != 0.0 && w.is_finite())
            .filter_map(|(t, w)| returns.column_index(t).map(|c| (c, t.as_str(), *w)))
            .collect();
        let total: f64 = active.iter().map(|(_, _, w)| w).sum();
        if active.is_empty() || total == 0.0 {
            return Err(FundError::insufficient("active holdings", 0, 1));
        }

        let series: Vec<Vec<f64>> = active
            .iter()
            .map(|(c, _, _)| {
                returns
                    .column(*c)
                    .into_iter()
                    .map(|r| if r.is_finite() { r } else { 0.0 })
                    .collect()
            })
            .collect();
        let weights: Vec<f64> = active.iter().map(|(_, _, w)| w / total).collect();

        let simulated: Vec<f64> = (0..returns.nrows())
            .map(|row| series.iter().zip(&weights).map(|(s, w)| s[row] * w).sum())
            .collect();
        let portfolio_risk = sample_std(&simulated) * scale.sqrt();
        if portfolio_risk == 0.0 || !portfolio_risk.is_finite() {
            return Err(FundError::insufficient(
                "active portfolio volatility",
                simulated.len(),
                2,
            ));
        }

        let holdings: Vec<RiskContribution> = active
            .iter()
            .zip(&series)
            .zip(&weights)
            .map(|(((_, ticker, _), s), w)| {
                let vol = sample_std(s) * scale.sqrt();
                let corr = correlation(s, &simulated);
                let marginal = vol * corr;
                let beta = marginal / portfolio_risk;
                RiskContribution {
                    ticker: ticker.to_string(),
                    weight: *w,
                    vol,
                    weighted_vol: vol * w,
                    corr,
                    marginal,
                    beta,
                    risk_budget: beta * w,
                    risk_impact: marginal * w,
                }
            })
            .collect();

        let sum_weighted_vol: f64 = holdings.iter().map(|h| h.weighted_vol).sum();
        debug!(holdings = holdings.len(), portfolio_risk, "risk budget computed");
        Ok(Self {
            holdings,
            portfolio_risk,
            sum_weighted_vol,
            diversification: sum_weighted_vol - portfolio_risk,
        })
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(
            "Ticker",
            RISK_COLUMNS.iter().map(|s| s.to_string()).collect(),
        );
        for h in &self.holdings {
            table.push_row(
                h.ticker.clone(),
                vec![
                    h.weight,
                    h.vol,
                    h.weighted_vol,
                    h.corr,
                    h.marginal,
                    h.beta,
                    h.risk_budget,
                    h.risk_impact,
                    f64::NAN,
                    f64::NAN,
                ],
            );
        }
        let risk = self.portfolio_risk;
        table.push_row(
            ACTIVE_PORTFOLIO,
            vec![
                1.0,
                risk,
                risk,
                1.0,
                risk,
                1.0,
                1.0,
                risk,
                self.sum_weighted_vol,
                self.diversification,
            ],
        );
        table
    }
}
