use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::PriceBar;

/// One row of an exchange symbol listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolListing {
    pub code: String,
    pub name: Option<String>,
    pub exchange: String,
    pub instrument_type: Option<String>,
    pub currency: Option<String>,
}

impl SymbolListing {
    /// Provider-qualified ticker, e.g. `SPY.US`.
    pub fn ticker(&self) -> String {
        format!("{}.{}", self.code.trim(), self.exchange.trim())
    }
}

/// A daily bar as the provider returned it. Prices are already parsed but may
/// still be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalPriceBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adjusted_close: Option<f64>,
    pub volume: Option<i64>,
}

impl ExternalPriceBar {
    /// Bars without a usable close are dropped. A missing adjusted close
    /// falls back to the close.
    pub fn into_price_bar(self, symbol: &str) -> Option<PriceBar> {
        let close = self.close.filter(|c| c.is_finite() && *c > 0.0)?;
        let adjusted_close = self
            .adjusted_close
            .filter(|c| c.is_finite() && *c > 0.0)
            .unwrap_or(close);

        Some(PriceBar {
            symbol: symbol.to_string(),
            date: self.date,
            open: self.open,
            high: self.high,
            low: self.low,
            close,
            adjusted_close,
            volume: self.volume,
        })
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Plan or billing limit reached: retrying today will not help.
    pub fn is_quota_exhausted(&self) -> bool {
        match self {
            ProviderError::Status { status: 402, .. } => true,
            ProviderError::Status { status: 403, body } => {
                let body = body.to_lowercase();
                body.contains("limit") || body.contains("quota") || body.contains("plan")
            }
            _ => false,
        }
    }

    /// Worth another attempt after backing off.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            ProviderError::Timeout | ProviderError::Network(_) => true,
            ProviderError::Parse(_) => false,
        }
    }
}

/// Raw access to an ETF data provider. Implementations do no retrying and no
/// rate limiting; that is the fetch client's job.
#[async_trait]
pub trait EtfDataProvider: Send + Sync {
    async fn list_symbols(
        &self,
        exchange: &str,
        instrument_type: &str,
    ) -> Result<Vec<SymbolListing>, ProviderError>;

    /// Fundamentals snapshot as untyped JSON; its shape varies per instrument.
    async fn fundamentals(&self, ticker: &str) -> Result<serde_json::Value, ProviderError>;

    async fn historical_prices(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ExternalPriceBar>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, body: &str) -> ProviderError {
        ProviderError::Status { status: code, body: body.to_string() }
    }

    #[test]
    fn classifies_status_codes() {
        assert!(status(429, "").is_transient());
        assert!(status(503, "").is_transient());
        assert!(!status(404, "").is_transient());
        assert!(status(404, "").is_not_found());
        assert!(ProviderError::Timeout.is_transient());
        assert!(!ProviderError::Parse("x".into()).is_transient());
    }

    #[test]
    fn detects_quota_signals() {
        assert!(status(402, "Payment required").is_quota_exhausted());
        assert!(status(403, "You have exceeded your daily API requests limit").is_quota_exhausted());
        assert!(!status(403, "Forbidden").is_quota_exhausted());
        assert!(!status(429, "Too many requests").is_quota_exhausted());
    }

    #[test]
    fn price_bar_without_close_is_dropped() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let bar = ExternalPriceBar {
            date,
            open: Some(10.0),
            high: None,
            low: None,
            close: None,
            adjusted_close: Some(9.5),
            volume: Some(100),
        };
        assert!(bar.clone().into_price_bar("SPY.US").is_none());

        let stored = ExternalPriceBar {
            close: Some(10.0),
            adjusted_close: None,
            ..bar
        }
        .into_price_bar("SPY.US")
        .unwrap();
        assert_eq!(stored.symbol, "SPY.US");
        assert_eq!(stored.adjusted_close, 10.0);
    }

    #[test]
    fn ticker_joins_code_and_exchange() {
        let listing = SymbolListing {
            code: "VTI".into(),
            name: Some("Vanguard Total Stock Market".into()),
            exchange: "US".into(),
            instrument_type: Some("ETF".into()),
            currency: Some("USD".into()),
        };
        assert_eq!(listing.ticker(), "VTI.US");
    }
}
