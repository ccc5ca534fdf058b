//! Run ledger: lifecycle of one synchronization run
//!
//! `start` returns an owned handle threaded through the run; there is no
//! process-wide "current run". Stat updates are best-effort — an audit-trail
//! write failure is logged and swallowed, never fatal to the run. A second
//! terminal call on the same handle is a silent no-op.

use crate::domain::sync_run::{LedgerStats, SyncRun, SyncStats, SyncStatus};
use crate::infrastructure::sync_log_repository::SyncLogRepository;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct SyncLedger {
    repo: SyncLogRepository,
}

impl SyncLedger {
    pub fn new(repo: SyncLogRepository) -> Self {
        Self { repo }
    }

    /// Open a run in `started` state and hand ownership of it to the caller.
    pub async fn start(&self, sync_type: &str, options: serde_json::Value) -> Result<RunHandle> {
        let started_at = Utc::now();
        let run_id = self.repo.insert_run(sync_type, &options, started_at).await?;
        info!(run_id, sync_type, %options, "Sync started");
        Ok(RunHandle {
            run_id,
            started_at,
            repo: self.repo.clone(),
            terminal: AtomicBool::new(false),
        })
    }

    pub async fn recent(&self, days: i64) -> Result<Vec<SyncRun>> {
        self.repo.recent(days).await
    }

    pub async fn recent_by_status(&self, days: i64, status: SyncStatus) -> Result<Vec<SyncRun>> {
        self.repo.recent_by_status(days, status).await
    }

    pub async fn recent_by_type(&self, days: i64, sync_type: &str) -> Result<Vec<SyncRun>> {
        self.repo.recent_by_type(days, sync_type).await
    }

    pub async fn stats(&self, days: i64) -> Result<LedgerStats> {
        self.repo.stats(days).await
    }
}

/// Exclusive owner of one `started` run for the invocation's lifetime.
pub struct RunHandle {
    run_id: i64,
    started_at: DateTime<Utc>,
    repo: SyncLogRepository,
    terminal: AtomicBool,
}

impl RunHandle {
    pub fn id(&self) -> i64 {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Best-effort: a failed correlation-id write does not abort the run.
    pub async fn set_batch_id(&self, batch_id: &str) {
        if let Err(e) = self.repo.set_batch_id(self.run_id, batch_id).await {
            warn!(run_id = self.run_id, "Failed to record batch id: {e:#}");
        }
    }

    /// Best-effort absolute counter update.
    pub async fn update_stats(&self, stats: &SyncStats) {
        if self.terminal.load(Ordering::Acquire) {
            return;
        }
        if let Err(e) = self.repo.update_stats(self.run_id, stats).await {
            warn!(run_id = self.run_id, "Failed to update sync stats: {e:#}");
        }
    }

    /// Terminal transition to `completed`. Returns the stamped row, or None
    /// when the run was already terminal or the write failed.
    pub async fn complete(&self, stats: &SyncStats) -> Option<SyncRun> {
        if self.terminal.swap(true, Ordering::AcqRel) {
            return None;
        }
        match self.repo.complete_run(self.run_id, self.started_at, stats).await {
            Ok(true) => {
                info!(run_id = self.run_id, "Sync completed successfully");
                self.fetch_row().await
            }
            Ok(false) => None,
            Err(e) => {
                error!(run_id = self.run_id, "Failed to record sync completion: {e:#}");
                None
            }
        }
    }

    /// Terminal transition to `failed` with a human-readable message.
    pub async fn fail(&self, error_message: &str, stats: &SyncStats) -> Option<SyncRun> {
        if self.terminal.swap(true, Ordering::AcqRel) {
            return None;
        }
        match self
            .repo
            .fail_run(self.run_id, error_message, self.started_at, stats)
            .await
        {
            Ok(true) => {
                error!(run_id = self.run_id, error_message, "Sync failed");
                self.fetch_row().await
            }
            Ok(false) => None,
            Err(e) => {
                error!(run_id = self.run_id, "Failed to record sync failure: {e:#}");
                None
            }
        }
    }

    async fn fetch_row(&self) -> Option<SyncRun> {
        match self.repo.get_run(self.run_id).await {
            Ok(row) => row,
            Err(e) => {
                warn!(run_id = self.run_id, "Failed to read back sync run: {e:#}");
                None
            }
        }
    }
}
