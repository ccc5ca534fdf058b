//! Run completion notification boundary
//!
//! The pipeline hands the terminal run row and the last batch snapshot to a
//! notifier exactly once per run; delivery is best-effort and a notifier
//! failure never re-fails the sync.

use crate::domain::batch::BatchSnapshot;
use crate::domain::sync_run::SyncRun;
use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait SyncNotifier: Send + Sync {
    /// Returns false on delivery failure; callers ignore the result beyond
    /// logging.
    async fn notify(&self, run: &SyncRun, batch: Option<&BatchSnapshot>) -> bool;
}

/// Default notifier: renders the report into the structured log stream.
pub struct LogNotifier;

#[async_trait]
impl SyncNotifier for LogNotifier {
    async fn notify(&self, run: &SyncRun, batch: Option<&BatchSnapshot>) -> bool {
        info!(
            run_id = run.id,
            sync_type = %run.sync_type,
            status = %run.status,
            fetched = run.stats.total_products_fetched,
            created = run.stats.products_created,
            updated = run.stats.products_updated,
            skipped = run.stats.products_skipped,
            failed = run.stats.products_failed,
            batches = run.stats.total_batches,
            duration = %run.duration_formatted(),
            "Sync run report"
        );
        if let Some(snapshot) = batch {
            info!(
                batch_id = %snapshot.batch_id,
                total = snapshot.total_units,
                pending = snapshot.pending_units,
                failed = snapshot.failed_units,
                progress = format!("{:.1}%", snapshot.progress_percentage()),
                "Final batch snapshot"
            );
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sync_run::{SyncStats, SyncStatus};
    use chrono::Utc;

    #[tokio::test]
    async fn log_notifier_always_reports_delivery() {
        let run = SyncRun {
            id: 1,
            sync_type: "full_sync".to_string(),
            status: SyncStatus::Completed,
            stats: SyncStats::default(),
            batch_id: Some("b-1".to_string()),
            error_message: None,
            sync_options: None,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            duration_seconds: Some(1),
        };
        assert!(LogNotifier.notify(&run, None).await);
    }
}
