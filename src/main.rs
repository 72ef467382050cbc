use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{error, info, warn};

use etf_pipeline::config::{IngestConfig, StoreBackend};
use etf_pipeline::external::eodhd::EodhdProvider;
use etf_pipeline::jobs::metric_snapshot_job;
use etf_pipeline::jobs::universe_sync_job::{IngestionOrchestrator, RunState};
use etf_pipeline::logging::{init_logging, LoggingConfig};
use etf_pipeline::services::fetch_client::FetchClient;
use etf_pipeline::services::job_scheduler_service::JobSchedulerService;
use etf_pipeline::state::IngestContext;
use etf_pipeline::store::{EtfStore, MemoryStore, PgStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Sync,
    Metrics,
    All,
    Schedule,
}

fn parse_mode(arg: Option<&str>) -> anyhow::Result<Mode> {
    match arg.unwrap_or("all") {
        "sync" => Ok(Mode::Sync),
        "metrics" => Ok(Mode::Metrics),
        "all" => Ok(Mode::All),
        "schedule" => Ok(Mode::Schedule),
        other => bail!("Unknown mode '{}'. Usage: etf-pipeline [sync|metrics|all|schedule]", other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env()).map_err(|e| anyhow::anyhow!("logging: {}", e))?;

    let args: Vec<String> = std::env::args().collect();
    let mode = parse_mode(args.get(1).map(String::as_str))?;

    let config = IngestConfig::from_env().context("invalid configuration")?;
    if mode != Mode::Metrics && config.api_key.is_empty() {
        bail!("EODHD_API_KEY is required for {:?}", mode);
    }

    let store: Arc<dyn EtfStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let url = config.database_url.as_deref().context("DATABASE_URL not set")?;
            Arc::new(PgStore::connect(url).await?)
        }
        StoreBackend::Memory => {
            warn!("⚠️  Using in-memory store, nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
    };

    let provider = Arc::new(EodhdProvider::new(config.base_url.clone(), config.api_key.clone()));
    let fetch = Arc::new(FetchClient::from_config(provider, &config));
    let ctx = IngestContext::new(store, fetch, config);

    let shutdown_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Shutdown requested, finishing current item...");
            shutdown_ctx.request_shutdown();
        }
    });

    info!("📊 etf-pipeline starting in {:?} mode", mode);

    match mode {
        Mode::Sync => {
            run_sync(&ctx).await?;
        }
        Mode::Metrics => run_metrics(&ctx).await?,
        Mode::All => {
            let state = run_sync(&ctx).await?;
            if state == RunState::Interrupted {
                info!("Skipping metrics after interrupt");
            } else {
                run_metrics(&ctx).await?;
            }
        }
        Mode::Schedule => {
            let mut scheduler = JobSchedulerService::new(ctx.clone()).await?;
            scheduler.start().await?;
            while !ctx.shutdown_requested() {
                tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
            }
            scheduler.stop().await?;
        }
    }

    Ok(())
}

async fn run_sync(ctx: &IngestContext) -> anyhow::Result<RunState> {
    let mut orchestrator = IngestionOrchestrator::new(ctx.clone());
    match orchestrator.run().await {
        Ok(summary) => {
            info!(
                "Sync finished in state {:?}: {}/{} remaining, {} API calls",
                summary.state, summary.remaining, summary.universe_size, summary.api_calls_used
            );
            Ok(summary.state)
        }
        Err(e) => {
            error!("❌ Sync failed: {}", e);
            Err(e.into())
        }
    }
}

async fn run_metrics(ctx: &IngestContext) -> anyhow::Result<()> {
    let result = metric_snapshot_job::compute_all_snapshots(ctx.clone()).await?;
    info!(
        "Metrics finished: {} computed, {} failed",
        result.items_processed, result.items_failed
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes() {
        assert_eq!(parse_mode(None).unwrap(), Mode::All);
        assert_eq!(parse_mode(Some("sync")).unwrap(), Mode::Sync);
        assert_eq!(parse_mode(Some("schedule")).unwrap(), Mode::Schedule);
        assert!(parse_mode(Some("serve")).is_err());
    }
}
