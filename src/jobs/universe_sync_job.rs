//! Full-universe ETF sync.
//!
//! Lists every ETF on the configured exchanges, then walks the list in
//! fixed-size batches. Each batch fetches concurrently and writes
//! sequentially, in listing order, before the next batch starts. Progress is
//! checkpointed to a JSON file so a stopped run resumes where it left off.
//!
//! # Per-item outcomes
//!
//! - fundamentals with a name: normalized and persisted, prices appended
//! - fundamentals without identifying fields: marked processed as no-data
//! - rate limited after retries: the whole loop cools down, the item is
//!   fetched once more, and left unprocessed if still limited
//! - quota exhausted: checkpoint and abort the run
//! - not found, fatal fetch errors, persistence errors: recorded as failed,
//!   marked processed, run continues

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::errors::AppError;
use crate::external::etf_data_provider::ExternalPriceBar;
use crate::models::{IngestionCheckpoint, PriceBar, RunStats};
use crate::services::fetch_client::FetchOutcome;
use crate::services::fundamentals_normalizer::{self, Normalized, NormalizedFundamentals};
use crate::services::job_scheduler_service::JobResult;
use crate::state::IngestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    FetchingUniverse,
    ProcessingBatch,
    Checkpointing,
    /// Call budget reached the safety threshold; resumable.
    SafetyStopped,
    /// Operator shutdown; resumable.
    Interrupted,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub state: RunState,
    pub stats: RunStats,
    pub universe_size: usize,
    /// Universe members still unprocessed when the run ended.
    pub remaining: usize,
    pub api_calls_used: u64,
}

/// What one item's fetch phase produced.
struct ItemFetch {
    fundamentals: FetchOutcome<Normalized>,
    /// `None` when prices were not requested (no usable fundamentals, or
    /// already up to date).
    prices: Option<FetchOutcome<Vec<ExternalPriceBar>>>,
}

impl ItemFetch {
    fn failed(fundamentals: FetchOutcome<Normalized>) -> Self {
        Self {
            fundamentals,
            prices: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ItemResult {
    Succeeded,
    NoData,
    Failed,
    RateLimited,
    QuotaExhausted(String),
}

pub struct IngestionOrchestrator {
    ctx: IngestContext,
    state: RunState,
}

impl IngestionOrchestrator {
    pub fn new(ctx: IngestContext) -> Self {
        Self {
            ctx,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        if self.state != next {
            debug!("Sync state: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Run one sync to a terminal state.
    ///
    /// Returns `Err` only for run-level failures (universe listing failed,
    /// quota exhausted, checkpoint unreadable); the checkpoint is saved first
    /// whenever there is progress to keep.
    pub async fn run(&mut self) -> Result<RunSummary, AppError> {
        info!("🚀 Starting ETF universe sync");

        let mut checkpoint = match self.ctx.checkpoints.load().await {
            Ok(Some(cp)) => {
                let carried = cp.calls_carried_over(Utc::now());
                info!(
                    "📂 Resuming from checkpoint: {} processed, {} failed, {} calls already used today",
                    cp.processed.len(),
                    cp.failed.len(),
                    carried
                );
                self.ctx.fetch.seed_calls(carried);
                cp
            }
            Ok(None) => IngestionCheckpoint::new(),
            Err(e) => {
                self.transition(RunState::Failed);
                return Err(e);
            }
        };

        self.transition(RunState::FetchingUniverse);
        let universe = match self.fetch_universe().await {
            Ok(universe) => universe,
            Err(e) => {
                error!("❌ Universe listing failed: {}", e);
                self.save_checkpoint(&mut checkpoint).await?;
                self.transition(RunState::Failed);
                return Err(e);
            }
        };

        let remaining: Vec<String> = universe
            .iter()
            .filter(|t| !checkpoint.is_processed(t))
            .cloned()
            .collect();
        info!(
            "📋 Universe: {} ETFs, {} remaining",
            universe.len(),
            remaining.len()
        );

        let mut successes_since_checkpoint = 0usize;

        for batch in remaining.chunks(self.ctx.config.batch_size) {
            if self.ctx.shutdown_requested() {
                return self.stop(RunState::Interrupted, &mut checkpoint, &universe).await;
            }
            if self.ctx.fetch.calls_used() >= self.ctx.config.safety_stop_calls {
                warn!(
                    "🛑 Safety stop: {} calls used (threshold {})",
                    self.ctx.fetch.calls_used(),
                    self.ctx.config.safety_stop_calls
                );
                return self.stop(RunState::SafetyStopped, &mut checkpoint, &universe).await;
            }

            self.transition(RunState::ProcessingBatch);
            let fetched = join_all(batch.iter().map(|ticker| self.fetch_item(ticker))).await;

            for (ticker, item) in batch.iter().zip(fetched) {
                if self.ctx.shutdown_requested() {
                    return self.stop(RunState::Interrupted, &mut checkpoint, &universe).await;
                }

                let mut result = self.process_item(&mut checkpoint, ticker, item).await;

                if result == ItemResult::RateLimited {
                    checkpoint.stats.rate_limit_pauses += 1;
                    warn!(
                        "⏸️  Rate limited on {}, pausing {:?} before retrying",
                        ticker, self.ctx.config.rate_limit_cooldown
                    );
                    tokio::time::sleep(self.ctx.config.rate_limit_cooldown).await;

                    let retry = self.fetch_item(ticker).await;
                    result = self.process_item(&mut checkpoint, ticker, retry).await;

                    if result == ItemResult::RateLimited {
                        warn!("❌ {} still rate limited after cool-down, leaving it for the next run", ticker);
                        checkpoint.record_failure(ticker);
                        checkpoint.stats.failed += 1;
                    }
                }

                match result {
                    ItemResult::QuotaExhausted(reason) => {
                        error!("❌ Provider quota exhausted on {}: {}", ticker, reason);
                        self.save_checkpoint(&mut checkpoint).await?;
                        self.transition(RunState::Failed);
                        return Err(AppError::QuotaExhausted(reason));
                    }
                    ItemResult::Succeeded => {
                        successes_since_checkpoint += 1;
                        if successes_since_checkpoint >= self.ctx.config.checkpoint_every {
                            successes_since_checkpoint = 0;
                            self.save_checkpoint(&mut checkpoint).await?;
                            self.report_progress(&checkpoint, universe.len());
                        }
                    }
                    ItemResult::NoData | ItemResult::Failed | ItemResult::RateLimited => {}
                }
            }

            checkpoint.stats.batches += 1;
            self.save_checkpoint(&mut checkpoint).await?;
        }

        if checkpoint.covers(&universe) {
            self.ctx.checkpoints.delete().await?;
        } else {
            self.save_checkpoint(&mut checkpoint).await?;
        }
        self.transition(RunState::Completed);

        let summary = self.summary(&checkpoint, &universe);
        info!(
            "✅ Sync completed: {} succeeded, {} no-data, {} failed, {} price bars, {} calls, {} left",
            summary.stats.succeeded,
            summary.stats.no_data,
            summary.stats.failed,
            summary.stats.price_bars_written,
            summary.api_calls_used,
            summary.remaining
        );
        Ok(summary)
    }

    /// Union of the configured exchanges' listings, filtered to the
    /// configured instrument type, deduplicated and sorted.
    async fn fetch_universe(&self) -> Result<Vec<String>, AppError> {
        let config = &self.ctx.config;
        let mut tickers = BTreeSet::new();

        for exchange in &config.exchanges {
            let mut outcome = self.ctx.fetch.list_symbols(exchange, &config.instrument_type).await;
            if matches!(outcome, FetchOutcome::RateLimited) {
                warn!("⏸️  Rate limited listing {}, pausing {:?}", exchange, config.rate_limit_cooldown);
                tokio::time::sleep(config.rate_limit_cooldown).await;
                outcome = self.ctx.fetch.list_symbols(exchange, &config.instrument_type).await;
            }

            match outcome {
                FetchOutcome::Ok(listings) => {
                    let before = tickers.len();
                    tickers.extend(
                        listings
                            .iter()
                            .filter(|l| {
                                l.instrument_type
                                    .as_deref()
                                    .map(|t| t.eq_ignore_ascii_case(&config.instrument_type))
                                    .unwrap_or(true)
                            })
                            .filter(|l| !l.code.trim().is_empty())
                            .map(|l| l.ticker()),
                    );
                    info!("Exchange {}: {} new tickers", exchange, tickers.len() - before);
                }
                FetchOutcome::NotFound => {
                    warn!("Exchange {} not found by provider, skipping", exchange);
                }
                FetchOutcome::RateLimited => return Err(AppError::RateLimited),
                FetchOutcome::QuotaExhausted(reason) => return Err(AppError::QuotaExhausted(reason)),
                FetchOutcome::Fatal(e) => {
                    return Err(AppError::External(format!("symbol list for {}: {}", exchange, e)))
                }
            }
        }

        Ok(tickers.into_iter().collect())
    }

    /// Fundamentals, then incremental price history. Prices are only
    /// requested for instruments whose fundamentals normalize completely.
    async fn fetch_item(&self, ticker: &str) -> ItemFetch {
        let fundamentals = match self.ctx.fetch.fundamentals(ticker).await {
            FetchOutcome::Ok(payload) => fundamentals_normalizer::normalize(ticker, &payload),
            FetchOutcome::RateLimited => return ItemFetch::failed(FetchOutcome::RateLimited),
            FetchOutcome::NotFound => return ItemFetch::failed(FetchOutcome::NotFound),
            FetchOutcome::QuotaExhausted(reason) => {
                return ItemFetch::failed(FetchOutcome::QuotaExhausted(reason))
            }
            FetchOutcome::Fatal(e) => return ItemFetch::failed(FetchOutcome::Fatal(e)),
        };
        if matches!(fundamentals, Normalized::NoData(_)) {
            return ItemFetch {
                fundamentals: FetchOutcome::Ok(fundamentals),
                prices: None,
            };
        }

        let today = Utc::now().date_naive();
        let from = match self.ctx.store.latest_price_date(ticker).await {
            Ok(Some(latest)) => latest + Duration::days(1),
            Ok(None) => history_start(today, self.ctx.config.history_years),
            Err(e) => {
                warn!("Could not read latest price date for {}: {}", ticker, e);
                history_start(today, self.ctx.config.history_years)
            }
        };

        let prices = if from > today {
            None
        } else {
            Some(self.ctx.fetch.historical_prices(ticker, from, today).await)
        };

        ItemFetch {
            fundamentals: FetchOutcome::Ok(fundamentals),
            prices,
        }
    }

    async fn process_item(
        &self,
        checkpoint: &mut IngestionCheckpoint,
        ticker: &str,
        item: ItemFetch,
    ) -> ItemResult {
        let normalized = match item.fundamentals {
            FetchOutcome::Ok(Normalized::Complete(n)) => n,
            FetchOutcome::Ok(Normalized::NoData(reason)) => {
                info!("⚪ {}: no data ({})", ticker, reason);
                checkpoint.mark_processed(ticker);
                checkpoint.clear_failure(ticker);
                checkpoint.stats.no_data += 1;
                return ItemResult::NoData;
            }
            FetchOutcome::RateLimited => return ItemResult::RateLimited,
            FetchOutcome::QuotaExhausted(reason) => return ItemResult::QuotaExhausted(reason),
            FetchOutcome::NotFound => {
                warn!("❌ {}: not found", ticker);
                return fail(checkpoint, ticker);
            }
            FetchOutcome::Fatal(e) => {
                warn!("❌ {}: fundamentals fetch failed: {}", ticker, e);
                return fail(checkpoint, ticker);
            }
        };

        let bars: Vec<PriceBar> = match item.prices {
            Some(FetchOutcome::Ok(raw)) => raw
                .into_iter()
                .filter_map(|bar| bar.into_price_bar(ticker))
                .collect(),
            Some(FetchOutcome::RateLimited) => return ItemResult::RateLimited,
            Some(FetchOutcome::QuotaExhausted(reason)) => return ItemResult::QuotaExhausted(reason),
            Some(FetchOutcome::NotFound) => {
                warn!("{}: no price history, keeping fundamentals", ticker);
                Vec::new()
            }
            Some(FetchOutcome::Fatal(e)) => {
                warn!("{}: price history fetch failed ({}), keeping fundamentals", ticker, e);
                Vec::new()
            }
            None => Vec::new(),
        };

        match self.persist(normalized, &bars).await {
            Ok(written) => {
                debug!("✅ {}: stored ({} new price bars)", ticker, written);
                checkpoint.mark_processed(ticker);
                checkpoint.clear_failure(ticker);
                checkpoint.stats.succeeded += 1;
                checkpoint.stats.price_bars_written += written;
                ItemResult::Succeeded
            }
            Err(e) => {
                error!("❌ {}: persistence failed: {}", ticker, e);
                fail(checkpoint, ticker)
            }
        }
    }

    /// Write one instrument's data. Returns the number of new price bars.
    async fn persist(&self, normalized: NormalizedFundamentals, bars: &[PriceBar]) -> Result<u64, AppError> {
        let store = &self.ctx.store;
        let as_of = normalized
            .profile
            .provider_updated_at
            .unwrap_or_else(|| Utc::now().date_naive());

        let instrument = store.upsert_instrument(&normalized.profile).await?;

        if let Some(rows) = normalized.holdings {
            store
                .replace_holdings(instrument.id, as_of, rows)
                .await?;
        }
        if let Some(rows) = normalized.sector_weights {
            store
                .replace_sector_weights(instrument.id, as_of, rows)
                .await?;
        }

        store.append_price_bars(bars).await
    }

    async fn save_checkpoint(&mut self, checkpoint: &mut IngestionCheckpoint) -> Result<(), AppError> {
        let previous = self.state;
        self.transition(RunState::Checkpointing);

        checkpoint.api_calls_used = self.ctx.fetch.calls_used();
        checkpoint.timestamp = Utc::now();
        let result = self.ctx.checkpoints.save(checkpoint).await;

        self.transition(previous);
        if let Err(e) = &result {
            error!("Failed to save checkpoint {}: {}", self.ctx.checkpoints.path().display(), e);
        }
        result
    }

    async fn stop(
        &mut self,
        state: RunState,
        checkpoint: &mut IngestionCheckpoint,
        universe: &[String],
    ) -> Result<RunSummary, AppError> {
        self.save_checkpoint(checkpoint).await?;
        self.transition(state);

        let summary = self.summary(checkpoint, universe);
        info!(
            "💾 Sync stopped ({:?}) with {} of {} remaining; checkpoint at {}",
            state,
            summary.remaining,
            summary.universe_size,
            self.ctx.checkpoints.path().display()
        );
        Ok(summary)
    }

    fn report_progress(&self, checkpoint: &IngestionCheckpoint, universe_size: usize) {
        let stats = &checkpoint.stats;
        info!(
            "📊 Progress: {}/{} processed | ✅ {} | ⚪ {} | ❌ {} | ⏸️ {} | {} calls | {:.0} tokens",
            checkpoint.processed.len(),
            universe_size,
            stats.succeeded,
            stats.no_data,
            stats.failed,
            stats.rate_limit_pauses,
            self.ctx.fetch.calls_used(),
            self.ctx.fetch.limiter().available_tokens()
        );
    }

    fn summary(&self, checkpoint: &IngestionCheckpoint, universe: &[String]) -> RunSummary {
        RunSummary {
            state: self.state,
            stats: checkpoint.stats.clone(),
            universe_size: universe.len(),
            remaining: universe.iter().filter(|t| !checkpoint.is_processed(t)).count(),
            api_calls_used: self.ctx.fetch.calls_used(),
        }
    }
}

fn fail(checkpoint: &mut IngestionCheckpoint, ticker: &str) -> ItemResult {
    checkpoint.record_failure(ticker);
    checkpoint.mark_processed(ticker);
    checkpoint.stats.failed += 1;
    ItemResult::Failed
}

fn history_start(today: NaiveDate, years: u32) -> NaiveDate {
    today - Duration::days(365 * years as i64)
}

/// Scheduler entry point.
pub async fn sync_universe(ctx: IngestContext) -> Result<JobResult, AppError> {
    let summary = IngestionOrchestrator::new(ctx).run().await?;
    Ok(JobResult {
        items_processed: (summary.stats.succeeded + summary.stats.no_data) as i32,
        items_failed: summary.stats.failed as i32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_start_goes_back_whole_years() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(history_start(today, 1), NaiveDate::from_ymd_opt(2023, 6, 2).unwrap());
    }

    #[test]
    fn test_fail_marks_processed_and_records() {
        let mut checkpoint = IngestionCheckpoint::new();
        assert_eq!(fail(&mut checkpoint, "BAD.US"), ItemResult::Failed);
        assert!(checkpoint.is_processed("BAD.US"));
        assert_eq!(checkpoint.failed, vec!["BAD.US".to_string()]);
        assert_eq!(checkpoint.stats.failed, 1);
    }
}
