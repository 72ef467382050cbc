use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Counters accumulated over an ingestion run (and carried across resumes).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub succeeded: u64,
    pub no_data: u64,
    pub failed: u64,
    pub rate_limit_pauses: u64,
    pub price_bars_written: u64,
    pub batches: u64,
}

/// Durable ingestion progress, stored as JSON so a stopped run can resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionCheckpoint {
    pub processed: BTreeSet<String>,
    pub failed: Vec<String>,
    pub api_calls_used: u64,
    #[serde(default)]
    pub stats: RunStats,
    pub timestamp: DateTime<Utc>,
}

impl IngestionCheckpoint {
    pub fn new() -> Self {
        Self {
            processed: BTreeSet::new(),
            failed: Vec::new(),
            api_calls_used: 0,
            stats: RunStats::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_processed(&self, ticker: &str) -> bool {
        self.processed.contains(ticker)
    }

    pub fn mark_processed(&mut self, ticker: &str) {
        self.processed.insert(ticker.to_string());
    }

    pub fn record_failure(&mut self, ticker: &str) {
        if !self.failed.iter().any(|t| t == ticker) {
            self.failed.push(ticker.to_string());
        }
    }

    /// Forget an earlier failure once the ticker has been handled.
    pub fn clear_failure(&mut self, ticker: &str) {
        self.failed.retain(|t| t != ticker);
    }

    /// Calls recorded by a checkpoint only count against today's budget
    /// when the checkpoint was written on the same UTC day.
    pub fn calls_carried_over(&self, now: DateTime<Utc>) -> u64 {
        if self.timestamp.date_naive() == now.date_naive() {
            self.api_calls_used
        } else {
            0
        }
    }

    /// True when every ticker of the universe has been processed.
    pub fn covers<'a, I>(&self, universe: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        universe.into_iter().all(|t| self.processed.contains(t))
    }
}

impl Default for IngestionCheckpoint {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn serializes_with_external_field_names() {
        let mut checkpoint = IngestionCheckpoint::new();
        checkpoint.mark_processed("SPY.US");
        checkpoint.record_failure("BAD.US");
        checkpoint.api_calls_used = 42;

        let json = serde_json::to_value(&checkpoint).unwrap();

        assert_eq!(json["processed"], serde_json::json!(["SPY.US"]));
        assert_eq!(json["failed"], serde_json::json!(["BAD.US"]));
        assert_eq!(json["apiCallsUsed"], 42);
        assert!(json["stats"].is_object());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn failures_are_not_duplicated() {
        let mut checkpoint = IngestionCheckpoint::new();
        checkpoint.record_failure("BAD.US");
        checkpoint.record_failure("BAD.US");
        assert_eq!(checkpoint.failed.len(), 1);
    }

    #[test]
    fn cleared_failures_leave_the_others() {
        let mut checkpoint = IngestionCheckpoint::new();
        checkpoint.record_failure("A.US");
        checkpoint.record_failure("B.US");
        checkpoint.clear_failure("A.US");
        checkpoint.clear_failure("Z.US");
        assert_eq!(checkpoint.failed, vec!["B.US".to_string()]);
    }

    #[test]
    fn calls_only_carry_over_within_the_same_day() {
        let mut checkpoint = IngestionCheckpoint::new();
        checkpoint.api_calls_used = 500;
        let now = checkpoint.timestamp;

        assert_eq!(checkpoint.calls_carried_over(now), 500);
        assert_eq!(checkpoint.calls_carried_over(now + Duration::days(1)), 0);
    }

    #[test]
    fn covers_requires_every_ticker() {
        let mut checkpoint = IngestionCheckpoint::new();
        let universe = vec!["A.US".to_string(), "B.US".to_string()];
        checkpoint.mark_processed("A.US");
        assert!(!checkpoint.covers(&universe));
        checkpoint.mark_processed("B.US");
        assert!(checkpoint.covers(&universe));
    }
}
