//! Metric Snapshot Job
//!
//! Recomputes the analytics snapshot of every stored instrument from the
//! persisted price series and latest holdings. Runs after a sync, or on its
//! own with `etf-pipeline metrics`.
//!
//! Each instrument's snapshot is dated at its own latest price bar, so an
//! instrument whose prices stopped updating still gets a consistent snapshot.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::{to_series, Instrument, SeriesPoint};
use crate::services::job_scheduler_service::JobResult;
use crate::services::metric_snapshot_service;
use crate::state::IngestContext;

/// Longest lookback any metric needs (5Y return plus match tolerance).
const LOOKBACK_DAYS: i64 = 5 * 365 + 30;

pub async fn compute_all_snapshots(ctx: IngestContext) -> Result<JobResult, AppError> {
    info!("📈 Computing metric snapshots...");

    let instruments = ctx.store.list_instruments().await?;
    if instruments.is_empty() {
        info!("No instruments stored, nothing to compute");
        return Ok(JobResult {
            items_processed: 0,
            items_failed: 0,
        });
    }

    let today = Utc::now().date_naive();
    let benchmark_ticker = ctx.config.benchmark_ticker.as_str();
    let benchmark = to_series(
        &ctx.store
            .price_range(benchmark_ticker, today - Duration::days(LOOKBACK_DAYS), today)
            .await?,
    );
    if benchmark.is_empty() {
        warn!("No prices stored for benchmark {}, beta will be unavailable", benchmark_ticker);
    }

    let mut processed = 0;
    let mut failed = 0;
    let mut skipped = 0;

    for instrument in &instruments {
        if ctx.shutdown_requested() {
            warn!("Shutdown requested, stopping metric computation");
            break;
        }

        match compute_one(&ctx, instrument, &benchmark).await {
            Ok(true) => processed += 1,
            Ok(false) => skipped += 1,
            Err(e) => {
                failed += 1;
                warn!("❌ Failed to compute metrics for {}: {}", instrument.ticker(), e);
            }
        }
    }

    info!(
        "Metric snapshots completed: {} computed, {} without prices, {} failed",
        processed, skipped, failed
    );

    Ok(JobResult {
        items_processed: processed,
        items_failed: failed,
    })
}

/// `Ok(false)` when the instrument has no stored prices.
async fn compute_one(
    ctx: &IngestContext,
    instrument: &Instrument,
    benchmark: &[SeriesPoint],
) -> Result<bool, AppError> {
    let ticker = instrument.ticker();
    let as_of = match ctx.store.latest_price_date(ticker).await? {
        Some(date) => date,
        None => return Ok(false),
    };

    let prices = to_series(
        &ctx.store
            .price_range(ticker, as_of - Duration::days(LOOKBACK_DAYS), as_of)
            .await?,
    );
    let holdings = ctx.store.latest_holdings(instrument.id).await?;

    let snapshot = metric_snapshot_service::compute_snapshot(
        ticker,
        &prices,
        benchmark,
        &holdings,
        ctx.config.risk_free_rate,
        as_of,
    );
    ctx.store.upsert_metric_snapshot(&snapshot).await?;

    Ok(true)
}
