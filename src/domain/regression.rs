//! Sample statistics and ordinary least squares.

use super::error::FundError;
use super::frame::Frame;
use super::returns::{Period, compound_by_period};
use super::table::Table;

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Standard deviation with `n − 1` in the denominator.
pub fn sample_std(xs: &[f64]) -> f64 {
    sample_covariance(xs, xs).sqrt()
}

pub fn population_std(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}

pub fn sample_covariance(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return f64::NAN;
    }
    let mx = mean(&xs[..n]);
    let my = mean(&ys[..n]);
    xs.iter()
        .zip(ys)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum::<f64>()
        / (n - 1) as f64
}

/// Pearson correlation; 0 when either side has no variance.
pub fn correlation(xs: &[f64], ys: &[f64]) -> f64 {
    let sx = sample_std(xs);
    let sy = sample_std(ys);
    if sx == 0.0 || sy == 0.0 || !sx.is_finite() || !sy.is_finite() {
        return 0.0;
    }
    sample_covariance(xs, ys) / (sx * sy)
}

/// Intercept, slope and residuals of `y = a + b·x`. `None` when `x` has no
/// variance or fewer than two points are given.
pub fn ols(y: &[f64], x: &[f64]) -> Option<(f64, f64, Vec<f64>)> {
    let n = y.len().min(x.len());
    if n < 2 {
        return None;
    }
    let mx = mean(&x[..n]);
    let my = mean(&y[..n]);
    let sxx: f64 = x[..n].iter().map(|v| (v - mx).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = x[..n].iter().zip(&y[..n]).map(|(a, b)| (a - mx) * (b - my)).sum();
    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let residuals = x[..n]
        .iter()
        .zip(&y[..n])
        .map(|(a, b)| b - intercept - slope * a)
        .collect();
    Some((intercept, slope, residuals))
}

/// Keeps index pairs where both values are finite.
pub fn paired(y: &[f64], x: &[f64]) -> (Vec<f64>, Vec<f64>) {
    y.iter()
        .zip(x)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .unzip()
}

/// OLS fit of an instrument's returns on the benchmark's.
#[derive(Debug, Clone, PartialEq)]
pub struct Regression {
    pub alpha: f64,
    pub beta: f64,
    /// Population standard deviation of the residuals.
    pub residual_std: f64,
    pub information_ratio: f64,
    /// Residual sum of squares over `n − 2`.
    pub mse: f64,
    pub t_alpha: f64,
    pub r_squared: f64,
    pub observations: usize,
}

impl Regression {
    pub fn fit(y: &[f64], x: &[f64], min_obs: usize) -> Result<Self, FundError> {
        let need = min_obs.max(3);
        let (y, x) = paired(y, x);
        let n = y.len();
        if n < need {
            return Err(FundError::insufficient("benchmark regression", n, need));
        }
        let (alpha, beta, residuals) =
            ols(&y, &x).ok_or_else(|| FundError::insufficient("benchmark variance", 0, 1))?;

        let ssr: f64 = residuals.iter().map(|e| e * e).sum();
        let my = mean(&y);
        let sst: f64 = y.iter().map(|v| (v - my).powi(2)).sum();
        let mse = ssr / (n - 2) as f64;
        let mx = mean(&x);
        let sxx: f64 = x.iter().map(|v| (v - mx).powi(2)).sum();
        let se_alpha = (mse * (1.0 / n as f64 + mx * mx / sxx)).sqrt();
        let residual_std = population_std(&residuals);

        Ok(Self {
            alpha,
            beta,
            residual_std,
            information_ratio: ratio_or_zero(alpha, residual_std),
            mse,
            t_alpha: ratio_or_zero(alpha, se_alpha),
            r_squared: if sst > 0.0 { 1.0 - ssr / sst } else { 0.0 },
            observations: n,
        })
    }
}

fn ratio_or_zero(num: f64, den: f64) -> f64 {
    if den == 0.0 || !den.is_finite() { 0.0 } else { num / den }
}

/// Row-per-instrument regression table on the benchmark column.
pub fn regression_table(returns: &Frame, benchmark: &str, min_obs: usize) -> Result<Table, FundError> {
    let x = returns
        .column_by_name(benchmark)
        .ok_or_else(|| FundError::BenchmarkMissing {
            ticker: benchmark.to_string(),
        })?;
    let mut table = Table::new(
        "Ticker",
        ["alpha", "beta", "residStd", "IR", "mse", "tAlpha", "R2", "obs"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    for (col, name) in returns.columns.iter().enumerate() {
        if name == benchmark {
            continue;
        }
        let row = match Regression::fit(&returns.column(col), &x, min_obs) {
            Ok(r) => vec![
                r.alpha,
                r.beta,
                r.residual_std,
                r.information_ratio,
                r.mse,
                r.t_alpha,
                r.r_squared,
                r.observations as f64,
            ],
            Err(e) => {
                tracing::debug!(ticker = %name, error = %e, "regression skipped");
                vec![f64::NAN; 8]
            }
        };
        table.push_row(name.clone(), row);
    }
    Ok(table)
}

/// Weekly alpha/beta of each ticker in `tickers` against the benchmark.
/// Tickers without enough weeks get an all-`NaN` row.
pub fn weekly_alpha_beta(
    daily: &Frame,
    tickers: &[String],
    benchmark: &str,
    min_obs: usize,
) -> Result<Table, FundError> {
    let bench_col = daily
        .column_index(benchmark)
        .ok_or_else(|| FundError::BenchmarkMissing {
            ticker: benchmark.to_string(),
        })?;
    let bench = compound_by_period(&daily.dates, &daily.column(bench_col), Period::Weekly);

    let mut table = Table::new(
        "Ticker",
        ["alpha", "beta", "tAlpha", "mse"].iter().map(|s| s.to_string()).collect(),
    );
    for ticker in tickers {
        let Some(col) = daily.column_index(ticker) else {
            continue;
        };
        let weekly = compound_by_period(&daily.dates, &daily.column(col), Period::Weekly);
        let row = match Regression::fit(&weekly.values, &bench.values, min_obs) {
            Ok(r) => vec![r.alpha, r.beta, r.t_alpha, r.mse],
            Err(_) => vec![f64::NAN; 4],
        };
        table.push_row(ticker.clone(), row);
    }
    Ok(table)
}
