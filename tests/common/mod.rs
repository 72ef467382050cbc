//! Scripted provider and context builders shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::time::Duration as StdDuration;

use etf_pipeline::config::{IngestConfig, StoreBackend};
use etf_pipeline::external::etf_data_provider::{
    EtfDataProvider, ExternalPriceBar, ProviderError, SymbolListing,
};
use etf_pipeline::services::fetch_client::FetchClient;
use etf_pipeline::state::IngestContext;
use etf_pipeline::store::{EtfStore, MemoryStore};

pub fn etf_payload(name: &str, holdings: &[(&str, f64)]) -> Value {
    let holdings: serde_json::Map<String, Value> = holdings
        .iter()
        .map(|(ticker, weight)| {
            let (code, exchange) = ticker.split_once('.').unwrap_or((ticker, "US"));
            (
                ticker.to_string(),
                json!({"Code": code, "Exchange": exchange, "Name": ticker, "Assets_%": weight}),
            )
        })
        .collect();

    json!({
        "General": {"Name": name, "Type": "ETF", "CurrencyCode": "USD"},
        "ETF_Data": {
            "Yield": "1.1",
            "NetExpenseRatio": "0.09",
            "Asset_Allocation": {
                "Stock US": {"Net_Assets_%": "90"},
                "Stock non-US": {"Net_Assets_%": "9"},
                "Cash": {"Net_Assets_%": "1"}
            },
            "Sector_Weights": {
                "Technology": {"Equity_%": "40"},
                "Healthcare": {"Equity_%": "20"}
            },
            "Holdings": holdings
        }
    })
}

/// In-process provider with per-ticker scripted failures.
///
/// Tickers without a fundamentals payload answer 404. Scripted errors are
/// returned first, in order, before the payload is served.
#[derive(Default)]
pub struct ScriptedProvider {
    listings: HashMap<String, Vec<SymbolListing>>,
    fundamentals: HashMap<String, Value>,
    fundamentals_errors: Mutex<HashMap<String, VecDeque<ProviderError>>>,
    always_failing: HashMap<String, ProviderError>,
    fundamentals_calls: Mutex<HashMap<String, usize>>,
    price_calls: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
    shutdown_after: Mutex<Option<(usize, Arc<AtomicBool>)>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_etf(mut self, ticker: &str, payload: Value) -> Self {
        let (code, exchange) = ticker.split_once('.').unwrap_or((ticker, "US"));
        self.listings
            .entry(exchange.to_string())
            .or_default()
            .push(SymbolListing {
                code: code.to_string(),
                name: Some(ticker.to_string()),
                exchange: exchange.to_string(),
                instrument_type: Some("ETF".to_string()),
                currency: Some("USD".to_string()),
            });
        self.fundamentals.insert(ticker.to_string(), payload);
        self
    }

    /// Listed, but the fundamentals endpoint answers 404.
    pub fn with_missing(mut self, ticker: &str) -> Self {
        let payload = Value::Null;
        self = self.with_etf(ticker, payload);
        self.fundamentals.remove(ticker);
        self
    }

    pub fn with_listing(mut self, exchange: &str, code: &str, instrument_type: &str) -> Self {
        self.listings
            .entry(exchange.to_string())
            .or_default()
            .push(SymbolListing {
                code: code.to_string(),
                name: None,
                exchange: exchange.to_string(),
                instrument_type: Some(instrument_type.to_string()),
                currency: None,
            });
        self
    }

    pub fn failing_first(self, ticker: &str, errors: Vec<ProviderError>) -> Self {
        self.fundamentals_errors
            .lock()
            .insert(ticker.to_string(), errors.into_iter().collect());
        self
    }

    pub fn failing_always(mut self, ticker: &str, error: ProviderError) -> Self {
        self.always_failing.insert(ticker.to_string(), error);
        self
    }

    /// Raise `flag` once `calls` fundamentals requests have been served.
    pub fn shutdown_after(self, calls: usize, flag: Arc<AtomicBool>) -> Self {
        *self.shutdown_after.lock() = Some((calls, flag));
        self
    }

    pub fn fundamentals_calls(&self, ticker: &str) -> usize {
        self.fundamentals_calls.lock().get(ticker).copied().unwrap_or(0)
    }

    pub fn total_fundamentals_calls(&self) -> usize {
        self.fundamentals_calls.lock().values().sum()
    }

    pub fn price_calls(&self) -> Vec<(String, NaiveDate, NaiveDate)> {
        self.price_calls.lock().clone()
    }
}

pub fn status(code: u16, body: &str) -> ProviderError {
    ProviderError::Status {
        status: code,
        body: body.to_string(),
    }
}

/// Deterministic daily closes, a gentle uptrend with a weekly wobble.
pub fn synthetic_close(ticker: &str, date: NaiveDate) -> f64 {
    let seed = ticker.bytes().map(|b| b as f64).sum::<f64>() % 50.0;
    let day = (date - NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()).num_days() as f64;
    50.0 + seed + day * 0.01 + (day / 7.0).sin() * 2.0
}

#[async_trait]
impl EtfDataProvider for ScriptedProvider {
    async fn list_symbols(
        &self,
        exchange: &str,
        _instrument_type: &str,
    ) -> Result<Vec<SymbolListing>, ProviderError> {
        self.listings
            .get(exchange)
            .cloned()
            .ok_or_else(|| status(404, "unknown exchange"))
    }

    async fn fundamentals(&self, ticker: &str) -> Result<Value, ProviderError> {
        let served = {
            let mut calls = self.fundamentals_calls.lock();
            *calls.entry(ticker.to_string()).or_default() += 1;
            calls.values().sum::<usize>()
        };
        if let Some((after, flag)) = self.shutdown_after.lock().as_ref() {
            if served >= *after {
                flag.store(true, Ordering::SeqCst);
            }
        }

        if let Some(err) = self.always_failing.get(ticker) {
            return Err(err.clone());
        }
        if let Some(err) = self
            .fundamentals_errors
            .lock()
            .get_mut(ticker)
            .and_then(|queue| queue.pop_front())
        {
            return Err(err);
        }

        self.fundamentals
            .get(ticker)
            .cloned()
            .ok_or_else(|| status(404, "Ticker Not Found."))
    }

    async fn historical_prices(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ExternalPriceBar>, ProviderError> {
        self.price_calls.lock().push((ticker.to_string(), from, to));

        let mut bars = Vec::new();
        let mut date = from;
        while date <= to {
            let close = synthetic_close(ticker, date);
            bars.push(ExternalPriceBar {
                date,
                open: Some(close - 0.5),
                high: Some(close + 1.0),
                low: Some(close - 1.0),
                close: Some(close),
                adjusted_close: Some(close),
                volume: Some(1_000_000),
            });
            date += Duration::days(1);
        }
        Ok(bars)
    }
}

pub fn test_config(checkpoint_path: &Path) -> IngestConfig {
    IngestConfig {
        store_backend: StoreBackend::Memory,
        api_key: "test".to_string(),
        exchanges: vec!["US".to_string()],
        batch_size: 2,
        checkpoint_every: 2,
        requests_per_minute: 60_000,
        daily_call_cap: 100_000,
        safety_stop_calls: 95_000,
        rate_limit_cooldown: StdDuration::from_secs(60),
        request_timeout: StdDuration::from_secs(20),
        max_retries: 1,
        retry_base: StdDuration::from_millis(10),
        checkpoint_path: checkpoint_path.to_path_buf(),
        history_years: 1,
        ..IngestConfig::default()
    }
}

pub fn context(
    provider: Arc<ScriptedProvider>,
    store: Arc<MemoryStore>,
    config: IngestConfig,
) -> IngestContext {
    let fetch = Arc::new(FetchClient::from_config(provider, &config));
    let store: Arc<dyn EtfStore> = store;
    IngestContext::new(store, fetch, config)
}
