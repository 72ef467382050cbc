use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::SeriesPoint;

pub const RSI_PERIOD: usize = 14;

/// Simple moving average of the most recent `period` closes.
///
/// `None` when fewer than `period` observations exist.
pub fn moving_average(prices: &[SeriesPoint], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }
    let window = &prices[prices.len() - period..];
    Some(window.iter().map(|p| p.close).sum::<f64>() / period as f64)
}

/// Relative Strength Index over the trailing 14 close-to-close changes.
///
/// Average gain and average loss are the plain means of the last 14 deltas
/// (Wilder's seed values):
/// - RS = Average Gain / Average Loss
/// - RSI = 100 - (100 / (1 + RS))
///
/// A window without losses reads 100. Needs at least 15 observations.
pub fn rsi14(prices: &[SeriesPoint]) -> Option<f64> {
    if prices.len() < RSI_PERIOD + 1 {
        return None;
    }

    let window = &prices[prices.len() - (RSI_PERIOD + 1)..];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1].close - w[0].close)
        .fold((0.0_f64, 0.0_f64), |(g, l), change| {
            if change > 0.0 {
                (g + change, l)
            } else {
                (g, l - change)
            }
        });

    let avg_gain = gains / RSI_PERIOD as f64;
    let avg_loss = losses / RSI_PERIOD as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub high: Option<f64>,
    pub low: Option<f64>,
}

/// Highest and lowest adjusted close over the trailing 365 calendar days.
pub fn fifty_two_week_range(prices: &[SeriesPoint], as_of: NaiveDate) -> PriceRange {
    let start = as_of - Duration::days(365);
    prices
        .iter()
        .filter(|p| p.date >= start && p.date <= as_of)
        .fold(PriceRange { high: None, low: None }, |range, p| PriceRange {
            high: Some(range.high.map_or(p.adjusted_close, |h| h.max(p.adjusted_close))),
            low: Some(range.low.map_or(p.adjusted_close, |l| l.min(p.adjusted_close))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(closes: &[f64]) -> Vec<SeriesPoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| SeriesPoint::new(start + Duration::days(i as i64), *c))
            .collect()
    }

    #[test]
    fn test_moving_average_uses_latest_closes() {
        let prices = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(moving_average(&prices, 2), Some(4.5));
        assert_eq!(moving_average(&prices, 5), Some(3.0));
    }

    #[test]
    fn test_moving_average_needs_full_period() {
        let prices = series(&[1.0, 2.0, 3.0]);
        assert_eq!(moving_average(&prices, 4), None);
        assert_eq!(moving_average(&prices, 0), None);
    }

    #[test]
    fn test_rsi_only_gains_is_100() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi14(&series(&closes)), Some(100.0));
    }

    #[test]
    fn test_rsi_only_losses_is_0() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let rsi = rsi14(&series(&closes)).unwrap();
        assert!(rsi.abs() < 1e-12);
    }

    #[test]
    fn test_rsi_needs_fifteen_points() {
        let closes: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi14(&series(&closes)), None);
    }

    #[test]
    fn test_rsi_balanced_moves_is_50() {
        // Alternating +1 / -1 over 14 deltas
        let closes: Vec<f64> = (0..15).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        let rsi = rsi14(&series(&closes)).unwrap();
        assert!((rsi - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_ignores_older_history() {
        let mut closes: Vec<f64> = (0..30).map(|i| 200.0 - i as f64).collect();
        let last = *closes.last().unwrap();
        closes.extend((1..=15).map(|i| last + i as f64));
        assert_eq!(rsi14(&series(&closes)), Some(100.0));
    }

    #[test]
    fn test_fifty_two_week_range_window() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let prices = vec![
            SeriesPoint::new(start, 500.0),
            SeriesPoint::new(start + Duration::days(30), 90.0),
            SeriesPoint::new(start + Duration::days(200), 130.0),
            SeriesPoint::new(start + Duration::days(400), 110.0),
        ];
        let range = fifty_two_week_range(&prices, start + Duration::days(400));
        assert_eq!(range.high, Some(130.0));
        assert_eq!(range.low, Some(110.0));
    }

    #[test]
    fn test_fifty_two_week_range_empty_window() {
        let prices = series(&[10.0, 11.0]);
        let range = fifty_two_week_range(&prices, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(range, PriceRange { high: None, low: None });
    }
}
