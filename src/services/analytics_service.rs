//! Return and risk analytics over daily price series.
//!
//! Every function is pure. Series are expected oldest first. "Today" is the
//! explicit `as_of` argument so results are reproducible. Insufficient input
//! yields `None`; no function ever reports 0 or NaN in place of a missing
//! value.
//!
//! Returns are computed on `adjusted_close` and expressed as fractions
//! (0.10 = 10%). Stored bars always have positive closes, so daily returns
//! never divide by zero.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::SeriesPoint;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// How far an observation may sit from the requested anchor date.
pub const MATCH_TOLERANCE_DAYS: i64 = 10;

pub const MIN_VOLATILITY_RETURNS: usize = 20;

pub const MIN_BETA_PAIRS: usize = 30;

/// Observation closest to `target` within the match tolerance.
///
/// Ties go to the earlier observation.
fn nearest_observation<'a, I>(points: I, target: NaiveDate) -> Option<&'a SeriesPoint>
where
    I: IntoIterator<Item = &'a SeriesPoint>,
{
    let mut best: Option<(&SeriesPoint, i64)> = None;
    for p in points {
        let distance = (p.date - target).num_days().abs();
        if distance > MATCH_TOLERANCE_DAYS {
            continue;
        }
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((p, distance)),
        }
    }
    best.map(|(p, _)| p)
}

fn simple_return(from: &SeriesPoint, to: &SeriesPoint) -> Option<f64> {
    if from.adjusted_close <= 0.0 {
        return None;
    }
    Some((to.adjusted_close - from.adjusted_close) / from.adjusted_close)
}

/// Return from the observation nearest to `as_of - days_back` to the latest one.
pub fn trailing_return(prices: &[SeriesPoint], days_back: i64, as_of: NaiveDate) -> Option<f64> {
    if prices.len() < 2 {
        return None;
    }
    let latest = prices.last()?;
    let anchor = nearest_observation(prices, as_of - Duration::days(days_back))?;
    simple_return(anchor, latest)
}

/// Year-to-date return, anchored on the last observation before January 1st
/// of `as_of`'s year (within the match tolerance of December 31st).
pub fn ytd_return(prices: &[SeriesPoint], as_of: NaiveDate) -> Option<f64> {
    if prices.len() < 2 {
        return None;
    }
    let jan_first = NaiveDate::from_ymd_opt(as_of.year(), 1, 1)?;
    let latest = prices.last()?;
    let anchor = nearest_observation(
        prices.iter().filter(|p| p.date < jan_first),
        jan_first - Duration::days(1),
    )?;
    simple_return(anchor, latest)
}

/// Simple percentage change between consecutive observations (length n−1).
pub fn daily_returns(prices: &[SeriesPoint]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| (w[1].adjusted_close - w[0].adjusted_close) / w[0].adjusted_close)
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n−1). Callers guarantee at least two values.
fn sample_variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0)
}

/// Annualized volatility: sample standard deviation of daily returns × √252.
pub fn volatility(prices: &[SeriesPoint]) -> Option<f64> {
    let returns = daily_returns(prices);
    if returns.len() < MIN_VOLATILITY_RETURNS {
        return None;
    }
    Some(sample_variance(&returns).sqrt() * TRADING_DAYS_PER_YEAR.sqrt())
}

/// (annual return − risk-free rate) / annualized volatility.
pub fn sharpe_ratio(annual_return: Option<f64>, volatility: Option<f64>, risk_free_rate: f64) -> Option<f64> {
    let (r, vol) = (annual_return?, volatility?);
    if vol == 0.0 {
        return None;
    }
    Some((r - risk_free_rate) / vol)
}

/// Sharpe ratio from the trailing one-year return and the series volatility.
pub fn sharpe(prices: &[SeriesPoint], risk_free_rate: f64, as_of: NaiveDate) -> Option<f64> {
    sharpe_ratio(trailing_return(prices, 365, as_of), volatility(prices), risk_free_rate)
}

/// Largest peak-to-trough decline as a positive fraction; 0 when the series
/// never falls.
pub fn max_drawdown(prices: &[SeriesPoint]) -> Option<f64> {
    if prices.len() < 2 {
        return None;
    }

    let mut peak = prices[0].adjusted_close;
    let mut max_dd = 0.0_f64;
    for p in prices {
        if p.adjusted_close > peak {
            peak = p.adjusted_close;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - p.adjusted_close) / peak);
        }
    }
    Some(max_dd)
}

/// Beta of `prices` against `benchmark`, on dates present in both series.
///
/// Needs at least 30 aligned observations; returns `None` when the benchmark
/// did not move.
pub fn beta(prices: &[SeriesPoint], benchmark: &[SeriesPoint]) -> Option<f64> {
    let bench_by_date: HashMap<NaiveDate, f64> = benchmark
        .iter()
        .map(|p| (p.date, p.adjusted_close))
        .collect();

    let aligned: Vec<(f64, f64)> = prices
        .iter()
        .filter_map(|p| bench_by_date.get(&p.date).map(|b| (p.adjusted_close, *b)))
        .collect();

    if aligned.len() < MIN_BETA_PAIRS {
        return None;
    }

    let (asset_returns, bench_returns): (Vec<f64>, Vec<f64>) = aligned
        .windows(2)
        .map(|w| ((w[1].0 - w[0].0) / w[0].0, (w[1].1 - w[0].1) / w[0].1))
        .unzip();

    let mean_a = mean(&asset_returns);
    let mean_b = mean(&bench_returns);
    let n = asset_returns.len() as f64;

    let cov = asset_returns
        .iter()
        .zip(&bench_returns)
        .map(|(a, b)| (a - mean_a) * (b - mean_b))
        .sum::<f64>()
        / (n - 1.0);
    let var_b = sample_variance(&bench_returns);

    if var_b.abs() < f64::EPSILON {
        return None;
    }

    Some(cov / var_b)
}

/// Observations in the trailing `days` calendar days, inclusive of both ends.
pub fn trailing_window(prices: &[SeriesPoint], days: i64, as_of: NaiveDate) -> &[SeriesPoint] {
    let start = as_of - Duration::days(days);
    let from = prices.partition_point(|p| p.date < start);
    let to = prices.partition_point(|p| p.date <= as_of);
    &prices[from..to.max(from)]
}
