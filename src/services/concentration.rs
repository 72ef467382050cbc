//! Holding concentration measures.
//!
//! Inputs are fractions (0.05 = 5%). Stored holding weights are percent, use
//! [`weights_as_fractions`] to convert.

use std::cmp::Ordering;

use crate::models::HoldingRecord;

pub const DEFAULT_TOP_N: usize = 10;

pub fn weights_as_fractions(holdings: &[HoldingRecord]) -> Vec<f64> {
    holdings.iter().map(|h| h.weight / 100.0).collect()
}

/// Herfindahl-Hirschman index: Σ weight². `None` for an empty portfolio.
pub fn hhi(weights: &[f64]) -> Option<f64> {
    if weights.is_empty() {
        return None;
    }
    Some(weights.iter().map(|w| w * w).sum())
}

/// Sum of the `n` largest weights, or of all of them when fewer exist.
pub fn top_n_weight(weights: &[f64], n: usize) -> f64 {
    let mut sorted = weights.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    sorted.iter().take(n).sum()
}

/// The `n` largest holdings, weight descending then ticker ascending.
///
/// The ticker tie-break makes the selection independent of input order when
/// weights are equal.
pub fn top_n_holdings(holdings: &[HoldingRecord], n: usize) -> Vec<&HoldingRecord> {
    let mut sorted: Vec<&HoldingRecord> = holdings.iter().collect();
    sorted.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.holding_ticker.cmp(&b.holding_ticker))
    });
    sorted.truncate(n);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn holding(ticker: &str, weight: f64) -> HoldingRecord {
        HoldingRecord {
            instrument_id: Uuid::nil(),
            holding_ticker: ticker.to_string(),
            name: None,
            sector: None,
            industry: None,
            country: None,
            weight,
            as_of_date: NaiveDate::from_ymd_opt(2024, 6, 28).unwrap(),
        }
    }

    #[test]
    fn test_hhi_single_holding_is_one() {
        assert_eq!(hhi(&[1.0]), Some(1.0));
    }

    #[test]
    fn test_hhi_equal_weights() {
        let h = hhi(&[0.1; 10]).unwrap();
        assert!((h - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_hhi_bounds_for_full_portfolio() {
        let weights = [0.5, 0.2, 0.15, 0.1, 0.05];
        let h = hhi(&weights).unwrap();
        assert!(h >= 1.0 / weights.len() as f64 && h <= 1.0);
    }

    #[test]
    fn test_hhi_empty_is_unavailable() {
        assert_eq!(hhi(&[]), None);
    }

    #[test]
    fn test_top_n_sums_largest() {
        let weights = [0.05, 0.3, 0.1, 0.2, 0.15, 0.2];
        let top3 = top_n_weight(&weights, 3);
        assert!((top3 - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_top_n_with_fewer_holdings_sums_all() {
        let weights = [0.4, 0.35, 0.25];
        assert!((top_n_weight(&weights, DEFAULT_TOP_N) - 1.0).abs() < 1e-12);
        assert_eq!(top_n_weight(&[], DEFAULT_TOP_N), 0.0);
    }

    #[test]
    fn test_top_n_holdings_tie_break_by_ticker() {
        let holdings = vec![
            holding("ZZZ.US", 5.0),
            holding("AAA.US", 5.0),
            holding("MMM.US", 9.0),
            holding("BBB.US", 5.0),
        ];

        let top = top_n_holdings(&holdings, 3);
        let tickers: Vec<&str> = top.iter().map(|h| h.holding_ticker.as_str()).collect();

        assert_eq!(tickers, vec!["MMM.US", "AAA.US", "BBB.US"]);
    }

    #[test]
    fn test_percent_weights_convert_to_fractions() {
        let holdings = vec![holding("A.US", 60.0), holding("B.US", 40.0)];
        let fractions = weights_as_fractions(&holdings);
        assert_eq!(fractions, vec![0.6, 0.4]);
        assert!((hhi(&fractions).unwrap() - 0.52).abs() < 1e-12);
    }
}
