use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One daily OHLCV bar for a symbol. Unique per (symbol, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PriceBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub adjusted_close: f64,
    pub volume: Option<i64>,
}

/// The slice of a bar the analytics functions work on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub close: f64,
    pub adjusted_close: f64,
}

impl SeriesPoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            adjusted_close: close,
        }
    }
}

impl From<&PriceBar> for SeriesPoint {
    fn from(bar: &PriceBar) -> Self {
        Self {
            date: bar.date,
            close: bar.close,
            adjusted_close: bar.adjusted_close,
        }
    }
}

/// Convert stored bars to an analytics series, oldest first.
pub fn to_series(bars: &[PriceBar]) -> Vec<SeriesPoint> {
    let mut series: Vec<SeriesPoint> = bars.iter().map(SeriesPoint::from).collect();
    series.sort_by_key(|p| p.date);
    series
}
