pub mod analytics_service;
pub mod concentration;
pub mod fetch_client;
pub mod fundamentals_normalizer;
pub mod indicators;
pub mod job_scheduler_service;
pub mod metric_snapshot_service;
pub mod rate_limiter;
