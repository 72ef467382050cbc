//! Background Jobs Module
//!
//! Jobs run from the command line or on a cron schedule via the job
//! scheduler service.
//!
//! # Available Jobs
//!
//! - `universe_sync_job` - Full-universe ETF ingestion with checkpoint/resume
//! - `metric_snapshot_job` - Recomputes analytics snapshots from stored data
//!
//! Both jobs are idempotent: re-running them rewrites the same rows.

pub mod metric_snapshot_job;
pub mod universe_sync_job;
