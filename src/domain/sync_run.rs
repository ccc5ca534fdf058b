//! Sync run audit types
//!
//! One `SyncRun` row is written per pipeline invocation and carries the
//! lifecycle `started -> completed | failed` plus the aggregate counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Type};

/// Lifecycle status of a synchronization run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    Started,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Started => "started",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(SyncStatus::Started),
            "completed" => Ok(SyncStatus::Completed),
            "failed" => Ok(SyncStatus::Failed),
            other => Err(format!("Invalid SyncStatus: {other}")),
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Type<sqlx::Sqlite> for SyncStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'q> Encode<'q, sqlx::Sqlite> for SyncStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as Encode<sqlx::Sqlite>>::encode(self.as_str().to_string(), buf)
    }
}

impl<'r> Decode<'r, sqlx::Sqlite> for SyncStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as Decode<sqlx::Sqlite>>::decode(value)?;
        s.parse::<SyncStatus>().map_err(Into::into)
    }
}

/// Aggregate counters for one run. Zero-initialized at `start`, then set
/// from the batch's own authoritative counters so redelivery cannot double
/// count.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStats {
    pub total_products_fetched: i64,
    pub products_created: i64,
    pub products_updated: i64,
    pub products_skipped: i64,
    pub products_failed: i64,
    pub total_batches: i64,
}

/// One row of the sync_logs audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: i64,
    pub sync_type: String,
    pub status: SyncStatus,
    pub stats: SyncStats,
    /// Correlation id of the batch dispatched for this run.
    pub batch_id: Option<String>,
    pub error_message: Option<String>,
    /// Options snapshot: batch size, source URL.
    pub sync_options: Option<serde_json::Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}

impl SyncRun {
    /// `MM:SS`, or `HH:MM:SS` once an hour is exceeded; `N/A` before the
    /// run has a recorded duration.
    pub fn duration_formatted(&self) -> String {
        match self.duration_seconds {
            None => "N/A".to_string(),
            Some(total) => {
                let hours = total / 3600;
                let minutes = (total % 3600) / 60;
                let seconds = total % 60;
                if hours > 0 {
                    format!("{hours:02}:{minutes:02}:{seconds:02}")
                } else {
                    format!("{minutes:02}:{seconds:02}")
                }
            }
        }
    }

    /// Item-level success rate for this run: created+updated over
    /// created+updated+failed, in percent. 0 when nothing was processed.
    pub fn success_rate(&self) -> f64 {
        let ok = self.stats.products_created + self.stats.products_updated;
        let failed = self.stats.products_failed;
        if ok + failed == 0 {
            return 0.0;
        }
        (ok as f64 / (ok + failed) as f64 * 10_000.0).round() / 100.0
    }
}

/// Aggregate over all runs started within a recency window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_syncs: i64,
    pub successful_syncs: i64,
    pub failed_syncs: i64,
    /// successful/total in percent; exactly 0 when the window is empty.
    pub success_rate: f64,
    pub total_products: i64,
    pub total_created: i64,
    pub total_updated: i64,
    pub total_failed: i64,
    /// Mean over runs with a positive recorded duration; 0 when none qualify.
    pub avg_duration_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with(stats: SyncStats, duration: Option<i64>) -> SyncRun {
        SyncRun {
            id: 1,
            sync_type: "full_sync".to_string(),
            status: SyncStatus::Completed,
            stats,
            batch_id: None,
            error_message: None,
            sync_options: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_seconds: duration,
        }
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [SyncStatus::Started, SyncStatus::Completed, SyncStatus::Failed] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("running".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(run_with(SyncStats::default(), None).duration_formatted(), "N/A");
        assert_eq!(run_with(SyncStats::default(), Some(62)).duration_formatted(), "01:02");
        assert_eq!(
            run_with(SyncStats::default(), Some(3 * 3600 + 5 * 60 + 9)).duration_formatted(),
            "03:05:09"
        );
    }

    #[test]
    fn success_rate_handles_empty_run() {
        assert_eq!(run_with(SyncStats::default(), None).success_rate(), 0.0);

        let stats = SyncStats {
            products_created: 3,
            products_updated: 1,
            products_failed: 1,
            ..Default::default()
        };
        assert_eq!(run_with(stats, None).success_rate(), 80.0);
    }
}
