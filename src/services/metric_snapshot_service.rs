use chrono::{NaiveDate, Utc};

use crate::models::{HoldingRecord, MetricSnapshot, SeriesPoint};
use crate::services::analytics_service::{self, trailing_return};
use crate::services::concentration::{self, DEFAULT_TOP_N};
use crate::services::indicators;

/// Calendar days in the risk window used for volatility, drawdown and beta.
pub const RISK_WINDOW_DAYS: i64 = 365;

/// Build the metric snapshot for one instrument.
///
/// # Arguments
/// * `prices` - the instrument's history, oldest first
/// * `benchmark` - benchmark history for beta, oldest first (may be empty)
/// * `holdings` - latest holdings, weights in percent
/// * `risk_free_rate` - annual rate as a fraction (e.g. 0.045)
/// * `as_of` - the date all trailing windows end on
pub fn compute_snapshot(
    ticker: &str,
    prices: &[SeriesPoint],
    benchmark: &[SeriesPoint],
    holdings: &[HoldingRecord],
    risk_free_rate: f64,
    as_of: NaiveDate,
) -> MetricSnapshot {
    let one_year = analytics_service::trailing_window(prices, RISK_WINDOW_DAYS, as_of);
    let bench_year = analytics_service::trailing_window(benchmark, RISK_WINDOW_DAYS, as_of);

    let return_1y = trailing_return(prices, 365, as_of);
    let volatility_1y = analytics_service::volatility(one_year);
    let range = indicators::fifty_two_week_range(prices, as_of);

    let weights = concentration::weights_as_fractions(holdings);

    MetricSnapshot {
        ticker: ticker.to_string(),
        as_of_date: as_of,
        last_close: prices.last().map(|p| p.close),
        return_1m: trailing_return(prices, 30, as_of),
        return_3m: trailing_return(prices, 91, as_of),
        return_6m: trailing_return(prices, 182, as_of),
        return_ytd: analytics_service::ytd_return(prices, as_of),
        return_1y,
        return_3y: trailing_return(prices, 3 * 365, as_of),
        return_5y: trailing_return(prices, 5 * 365, as_of),
        volatility_1y,
        sharpe_1y: analytics_service::sharpe_ratio(return_1y, volatility_1y, risk_free_rate),
        max_drawdown_1y: analytics_service::max_drawdown(one_year),
        beta_1y: analytics_service::beta(one_year, bench_year),
        rsi_14: indicators::rsi14(prices),
        sma_50: indicators::moving_average(prices, 50),
        sma_200: indicators::moving_average(prices, 200),
        high_52w: range.high,
        low_52w: range.low,
        hhi: concentration::hhi(&weights),
        top_10_weight: if weights.is_empty() {
            None
        } else {
            Some(concentration::top_n_weight(&weights, DEFAULT_TOP_N))
        },
        holdings_count: holdings.len() as i32,
        computed_at: Utc::now(),
    }
}
