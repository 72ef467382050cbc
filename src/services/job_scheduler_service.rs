use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::jobs::{metric_snapshot_job, universe_sync_job};
use crate::state::IngestContext;

#[derive(Debug)]
pub struct JobResult {
    pub items_processed: i32,
    pub items_failed: i32,
}

pub struct JobSchedulerService {
    scheduler: JobScheduler,
    context: IngestContext,
    // Sync and metrics share the provider budget and the store; never overlap runs
    run_lock: Arc<Mutex<()>>,
}

impl JobSchedulerService {
    pub async fn new(context: IngestContext) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::External(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            context,
            run_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Schedule the nightly sync followed by metric computation.
    pub async fn start(&mut self) -> Result<(), AppError> {
        info!("🚀 Starting job scheduler...");

        let schedule = self.context.config.sync_schedule.clone();
        self.schedule_job(&schedule, "sync_and_metrics", "ETF universe sync, then metrics", sync_then_metrics)
            .await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::External(format!("Failed to start scheduler: {}", e)))?;

        info!("✅ Job scheduler started");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), AppError> {
        info!("🛑 Stopping job scheduler...");
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::External(format!("Failed to stop scheduler: {}", e)))?;
        info!("✅ Job scheduler stopped");
        Ok(())
    }

    async fn schedule_job<F, Fut>(
        &mut self,
        schedule: &str,
        job_name: &'static str,
        description: &str,
        job_fn: F,
    ) -> Result<(), AppError>
    where
        F: Fn(IngestContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<JobResult, AppError>> + Send + 'static,
    {
        let context = self.context.clone();
        let run_lock = self.run_lock.clone();
        let job_fn = Arc::new(job_fn);

        let job = Job::new_async(schedule, move |_uuid, _l| {
            let context = context.clone();
            let run_lock = run_lock.clone();
            let job_fn = job_fn.clone();
            Box::pin(async move {
                let _guard = match run_lock.try_lock() {
                    Ok(guard) => guard,
                    Err(_) => {
                        warn!("⏭️  Skipping {}: previous run still in progress", job_name);
                        return;
                    }
                };
                execute_job_with_tracking(job_name, context, job_fn).await;
            })
        })
        .map_err(|e| AppError::Config(format!("Invalid schedule for job {}: {}", job_name, e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::External(format!("Failed to add job {}: {}", job_name, e)))?;

        info!("📅 Scheduled: {} - {} [cron: {}]", job_name, description, schedule);
        Ok(())
    }
}

async fn execute_job_with_tracking<F, Fut>(job_name: &str, context: IngestContext, job_fn: Arc<F>)
where
    F: Fn(IngestContext) -> Fut,
    Fut: std::future::Future<Output = Result<JobResult, AppError>>,
{
    info!("🏃 Starting job: {}", job_name);
    let started_at = Utc::now();

    let result = job_fn(context).await;
    let duration_ms = (Utc::now() - started_at).num_milliseconds();

    match result {
        Ok(job_result) => info!(
            "✅ Job completed: {} (processed: {}, failed: {}, duration: {}ms)",
            job_name, job_result.items_processed, job_result.items_failed, duration_ms
        ),
        Err(e) => error!("❌ Job failed: {} - {} (duration: {}ms)", job_name, e, duration_ms),
    }
}

/// Metrics need no provider calls, so they are refreshed from stored data
/// even when the sync stopped early or failed.
pub async fn sync_then_metrics(ctx: IngestContext) -> Result<JobResult, AppError> {
    let sync = match universe_sync_job::sync_universe(ctx.clone()).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Sync failed ({}), computing metrics from stored data", e);
            JobResult {
                items_processed: 0,
                items_failed: 0,
            }
        }
    };

    let metrics = metric_snapshot_job::compute_all_snapshots(ctx).await?;

    Ok(JobResult {
        items_processed: sync.items_processed + metrics.items_processed,
        items_failed: sync.items_failed + metrics.items_failed,
    })
}
