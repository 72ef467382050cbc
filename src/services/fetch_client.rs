use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

use crate::config::IngestConfig;
use crate::external::etf_data_provider::{EtfDataProvider, ExternalPriceBar, ProviderError, SymbolListing};
use crate::services::rate_limiter::RateLimiter;

/// Result of a provider call after retries, tagged so callers branch on the
/// kind of failure instead of inspecting error strings.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Ok(T),
    /// Still answered 429 after every retry.
    RateLimited,
    NotFound,
    /// Plan or billing limit; nothing more can be fetched today.
    QuotaExhausted(String),
    /// Retries exhausted on a transient error, or a non-retryable error.
    Fatal(ProviderError),
}

impl<T> FetchOutcome<T> {
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Ok(_) => "ok",
            FetchOutcome::RateLimited => "rate_limited",
            FetchOutcome::NotFound => "not_found",
            FetchOutcome::QuotaExhausted(_) => "quota_exhausted",
            FetchOutcome::Fatal(_) => "fatal",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt + 1`: base·2^attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

/// Rate-limited, retrying front for an [`EtfDataProvider`].
///
/// Every attempt (including retries and failures) takes a rate-limiter token
/// and counts towards the daily call budget.
pub struct FetchClient {
    provider: Arc<dyn EtfDataProvider>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    request_timeout: Duration,
    calls: AtomicU64,
}

impl FetchClient {
    pub fn new(
        provider: Arc<dyn EtfDataProvider>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            limiter,
            policy,
            request_timeout,
            calls: AtomicU64::new(0),
        }
    }

    pub fn from_config(provider: Arc<dyn EtfDataProvider>, config: &IngestConfig) -> Self {
        Self::new(
            provider,
            Arc::new(RateLimiter::new(config.requests_per_minute)),
            RetryPolicy {
                max_retries: config.max_retries,
                base_delay: config.retry_base,
            },
            config.request_timeout,
        )
    }

    /// Calls made so far, including any seeded from an earlier run today.
    pub fn calls_used(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Start the budget counter from calls already spent today.
    pub fn seed_calls(&self, calls: u64) {
        self.calls.store(calls, Ordering::SeqCst);
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub async fn list_symbols(&self, exchange: &str, instrument_type: &str) -> FetchOutcome<Vec<SymbolListing>> {
        let label = format!("symbol-list {}", exchange);
        self.call(&label, || self.provider.list_symbols(exchange, instrument_type))
            .await
    }

    pub async fn fundamentals(&self, ticker: &str) -> FetchOutcome<serde_json::Value> {
        let label = format!("fundamentals {}", ticker);
        self.call(&label, || self.provider.fundamentals(ticker)).await
    }

    pub async fn historical_prices(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> FetchOutcome<Vec<ExternalPriceBar>> {
        let label = format!("prices {}", ticker);
        self.call(&label, || self.provider.historical_prices(ticker, from, to))
            .await
    }

    async fn call<T, F, Fut>(&self, label: &str, op: F) -> FetchOutcome<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            self.limiter.acquire().await;
            self.calls.fetch_add(1, Ordering::SeqCst);

            let result = match timeout(self.request_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout),
            };

            let err = match result {
                Ok(value) => return FetchOutcome::Ok(value),
                Err(err) => err,
            };

            if err.is_not_found() {
                debug!("{}: not found", label);
                return FetchOutcome::NotFound;
            }
            if err.is_quota_exhausted() {
                warn!("{}: provider quota exhausted ({})", label, err);
                return FetchOutcome::QuotaExhausted(err.to_string());
            }
            if !err.is_transient() {
                warn!("{}: non-retryable error: {}", label, err);
                return FetchOutcome::Fatal(err);
            }
            if attempt >= self.policy.max_retries {
                warn!("{}: giving up after {} attempts: {}", label, attempt + 1, err);
                return if err.is_rate_limited() {
                    FetchOutcome::RateLimited
                } else {
                    FetchOutcome::Fatal(err)
                };
            }

            let delay = self.policy.backoff(attempt);
            warn!(
                "{}: {} - retrying in {:?} (attempt {}/{})",
                label,
                err,
                delay,
                attempt + 1,
                self.policy.max_retries
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}
