use std::path::PathBuf;
use std::str::FromStr;
use tokio::time::Duration;

use crate::errors::AppError;

/// Which persistence backend the runner writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(AppError::Config(format!(
                "Invalid STORE_BACKEND: {}. Must be 'postgres' or 'memory'",
                other
            ))),
        }
    }
}

/// Runtime settings for ingestion and metric computation, read from the environment.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub database_url: Option<String>,
    pub api_key: String,
    pub base_url: String,
    pub exchanges: Vec<String>,
    pub instrument_type: String,
    pub batch_size: usize,
    pub checkpoint_every: usize,
    pub requests_per_minute: u32,
    pub daily_call_cap: u64,
    pub safety_stop_calls: u64,
    pub rate_limit_cooldown: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub checkpoint_path: PathBuf,
    pub history_years: u32,
    pub benchmark_ticker: String,
    pub risk_free_rate: f64,
    pub store_backend: StoreBackend,
    pub sync_schedule: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            api_key: String::new(),
            base_url: "https://eodhd.com/api".to_string(),
            exchanges: vec!["US".to_string()],
            instrument_type: "ETF".to_string(),
            batch_size: 10,
            checkpoint_every: 50,
            requests_per_minute: 1000,
            daily_call_cap: 100_000,
            safety_stop_calls: 95_000,
            rate_limit_cooldown: Duration::from_secs(60),
            request_timeout: Duration::from_secs(20),
            max_retries: 3,
            retry_base: Duration::from_millis(1000),
            checkpoint_path: PathBuf::from("ingestion_checkpoint.json"),
            history_years: 5,
            benchmark_ticker: "SPY.US".to_string(),
            risk_free_rate: 0.045,
            store_backend: StoreBackend::Postgres,
            sync_schedule: "0 0 2 * * *".to_string(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        _ => Ok(default),
    }
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let exchanges = std::env::var("INGEST_EXCHANGES")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.exchanges);

        let config = Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            api_key: std::env::var("EODHD_API_KEY").unwrap_or_default(),
            base_url: std::env::var("EODHD_BASE_URL").unwrap_or(defaults.base_url),
            exchanges,
            instrument_type: std::env::var("INGEST_INSTRUMENT_TYPE")
                .unwrap_or(defaults.instrument_type),
            batch_size: env_parse("INGEST_BATCH_SIZE", defaults.batch_size)?,
            checkpoint_every: env_parse("INGEST_CHECKPOINT_EVERY", defaults.checkpoint_every)?,
            requests_per_minute: env_parse("REQUESTS_PER_MINUTE", defaults.requests_per_minute)?,
            daily_call_cap: env_parse("DAILY_CALL_CAP", defaults.daily_call_cap)?,
            safety_stop_calls: env_parse("SAFETY_STOP_CALLS", defaults.safety_stop_calls)?,
            rate_limit_cooldown: Duration::from_secs(env_parse(
                "RATE_LIMIT_COOLDOWN_SECS",
                defaults.rate_limit_cooldown.as_secs(),
            )?),
            request_timeout: Duration::from_secs(env_parse(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            max_retries: env_parse("MAX_RETRIES", defaults.max_retries)?,
            retry_base: Duration::from_millis(env_parse(
                "RETRY_BASE_MS",
                defaults.retry_base.as_millis() as u64,
            )?),
            checkpoint_path: std::env::var("CHECKPOINT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.checkpoint_path),
            history_years: env_parse("HISTORY_YEARS", defaults.history_years)?,
            benchmark_ticker: std::env::var("BENCHMARK_TICKER")
                .unwrap_or(defaults.benchmark_ticker),
            risk_free_rate: env_parse("RISK_FREE_RATE", defaults.risk_free_rate)?,
            store_backend: env_parse("STORE_BACKEND", defaults.store_backend)?,
            sync_schedule: std::env::var("SYNC_SCHEDULE").unwrap_or(defaults.sync_schedule),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.batch_size == 0 {
            return Err(AppError::Config("INGEST_BATCH_SIZE must be at least 1".into()));
        }
        if self.checkpoint_every == 0 {
            return Err(AppError::Config("INGEST_CHECKPOINT_EVERY must be at least 1".into()));
        }
        if self.requests_per_minute == 0 {
            return Err(AppError::Config("REQUESTS_PER_MINUTE must be at least 1".into()));
        }
        if self.safety_stop_calls >= self.daily_call_cap {
            return Err(AppError::Config(format!(
                "SAFETY_STOP_CALLS ({}) must stay below DAILY_CALL_CAP ({})",
                self.safety_stop_calls, self.daily_call_cap
            )));
        }
        if self.store_backend == StoreBackend::Postgres && self.database_url.is_none() {
            return Err(AppError::Config("DATABASE_URL is required for the postgres store".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> IngestConfig {
        IngestConfig {
            store_backend: StoreBackend::Memory,
            ..IngestConfig::default()
        }
    }

    #[test]
    fn defaults_validate_with_memory_store() {
        assert!(memory_config().validate().is_ok());
    }

    #[test]
    fn postgres_store_requires_database_url() {
        let err = IngestConfig::default().validate().unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("DATABASE_URL")));
    }

    #[test]
    fn safety_stop_must_stay_below_daily_cap() {
        let config = IngestConfig {
            safety_stop_calls: 100_000,
            daily_call_cap: 100_000,
            ..memory_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = IngestConfig {
            batch_size: 0,
            ..memory_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn store_backend_parses_aliases() {
        assert_eq!("PG".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }
}
