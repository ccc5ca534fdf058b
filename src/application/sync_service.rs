//! Full catalog synchronization: fetch, dispatch, monitor, record, notify.

use crate::application::batch::{chunk_count, BatchCoordinator};
use crate::application::ledger::SyncLedger;
use crate::application::progress::ProgressMonitor;
use crate::domain::batch::BatchSnapshot;
use crate::domain::sync_run::{SyncRun, SyncStats};
use crate::infrastructure::http_client::{CatalogFetcher, FetchError};
use crate::infrastructure::notifier::SyncNotifier;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Outcome of one synchronization run, for callers that render a summary.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Terminal ledger row, when the audit write succeeded.
    pub run: Option<SyncRun>,
    pub snapshot: BatchSnapshot,
    pub stats: SyncStats,
}

pub struct ProductSyncService {
    fetcher: Arc<dyn CatalogFetcher>,
    coordinator: BatchCoordinator,
    ledger: SyncLedger,
    notifier: Arc<dyn SyncNotifier>,
    monitor: ProgressMonitor,
    api_url: String,
    batch_size: usize,
}

impl ProductSyncService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: Arc<dyn CatalogFetcher>,
        coordinator: BatchCoordinator,
        ledger: SyncLedger,
        notifier: Arc<dyn SyncNotifier>,
        monitor: ProgressMonitor,
        api_url: String,
        batch_size: usize,
    ) -> Self {
        Self {
            fetcher,
            coordinator,
            ledger,
            notifier,
            monitor,
            api_url,
            batch_size: batch_size.max(1),
        }
    }

    /// Run one full catalog sync end to end. Individual record failures are
    /// counted, not fatal; only an unreachable source fails the whole run.
    pub async fn sync_all_products(&self) -> Result<SyncReport, SyncError> {
        let options = json!({
            "batch_size": self.batch_size,
            "api_url": self.api_url,
        });
        let run = self.ledger.start("full_sync", options).await?;

        let records = match self.fetcher.fetch_catalog().await {
            Ok(records) => records,
            Err(e) => {
                let terminal = run.fail(&e.to_string(), &SyncStats::default()).await;
                if let Some(row) = &terminal {
                    self.notifier.notify(row, None).await;
                }
                return Err(e.into());
            }
        };

        let mut stats = SyncStats {
            total_products_fetched: records.len() as i64,
            total_batches: chunk_count(records.len(), self.batch_size) as i64,
            ..Default::default()
        };
        run.update_stats(&stats).await;
        info!(
            run_id = run.id(),
            fetched = stats.total_products_fetched,
            batches = stats.total_batches,
            "Catalog fetched, dispatching batches"
        );

        let handle = self.coordinator.submit(records, self.batch_size);
        run.set_batch_id(handle.id()).await;

        let snapshot = self.monitor.monitor(&handle).await;
        if !snapshot.finished {
            warn!(
                run_id = run.id(),
                batch_id = %snapshot.batch_id,
                pending = snapshot.pending_units,
                "Monitoring budget exhausted before batch settled"
            );
        }

        let counts = handle.counts();
        stats.products_created = counts.created as i64;
        stats.products_updated = counts.updated as i64;
        stats.products_skipped = counts.skipped as i64;
        stats.products_failed = counts.failed as i64;

        let terminal = run.complete(&stats).await;
        if let Some(row) = &terminal {
            self.notifier.notify(row, Some(&snapshot)).await;
        }

        Ok(SyncReport { run: terminal, snapshot, stats })
    }
}
