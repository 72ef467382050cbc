use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Derived analytics for one instrument as of one date.
///
/// Returns, volatility and drawdown are fractions (0.10 = 10%). Holding
/// concentration is computed from weights converted to fractions. `None`
/// means the input history was insufficient for that metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MetricSnapshot {
    pub ticker: String,
    pub as_of_date: NaiveDate,
    pub last_close: Option<f64>,
    pub return_1m: Option<f64>,
    pub return_3m: Option<f64>,
    pub return_6m: Option<f64>,
    pub return_ytd: Option<f64>,
    pub return_1y: Option<f64>,
    pub return_3y: Option<f64>,
    pub return_5y: Option<f64>,
    pub volatility_1y: Option<f64>,
    pub sharpe_1y: Option<f64>,
    pub max_drawdown_1y: Option<f64>,
    pub beta_1y: Option<f64>,
    pub rsi_14: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub high_52w: Option<f64>,
    pub low_52w: Option<f64>,
    /// Σ weight² over the reported holdings only, weights as fractions of net
    /// assets. When the provider lists just the top constituents this can sit
    /// below 1/n.
    pub hhi: Option<f64>,
    pub top_10_weight: Option<f64>,
    pub holdings_count: i32,
    pub computed_at: DateTime<Utc>,
}
