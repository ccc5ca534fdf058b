//! Repository for the sync_logs audit trail
//!
//! One row per run. Terminal transitions are guarded by
//! `WHERE status = 'started'` so a redelivered completion can never restamp
//! the completion time or duration.

use crate::domain::sync_run::{LedgerStats, SyncRun, SyncStats, SyncStatus};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;

#[derive(Clone)]
pub struct SyncLogRepository {
    pool: Arc<SqlitePool>,
}

impl SyncLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Create the run row in `started` state and return its id.
    pub async fn insert_run(
        &self,
        sync_type: &str,
        options: &serde_json::Value,
        started_at: DateTime<Utc>,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_logs (sync_type, status, sync_options, started_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(sync_type)
        .bind(SyncStatus::Started)
        .bind(options.to_string())
        .bind(started_at)
        .execute(&*self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Record the batch correlation id once dispatch has happened.
    pub async fn set_batch_id(&self, run_id: i64, batch_id: &str) -> Result<()> {
        sqlx::query("UPDATE sync_logs SET batch_id = ? WHERE id = ?")
            .bind(batch_id)
            .bind(run_id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    /// Overwrite the counters with authoritative values. Absolute sets keep
    /// redelivered updates idempotent.
    pub async fn update_stats(&self, run_id: i64, stats: &SyncStats) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_logs
            SET total_products_fetched = ?, products_created = ?, products_updated = ?,
                products_skipped = ?, products_failed = ?, total_batches = ?
            WHERE id = ? AND status = 'started'
            "#,
        )
        .bind(stats.total_products_fetched)
        .bind(stats.products_created)
        .bind(stats.products_updated)
        .bind(stats.products_skipped)
        .bind(stats.products_failed)
        .bind(stats.total_batches)
        .bind(run_id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// Terminal transition to `completed`. Returns false when the run was
    /// already terminal (the call is then a no-op).
    pub async fn complete_run(
        &self,
        run_id: i64,
        started_at: DateTime<Utc>,
        stats: &SyncStats,
    ) -> Result<bool> {
        self.finish_run(run_id, SyncStatus::Completed, None, started_at, stats).await
    }

    /// Terminal transition to `failed` with a human-readable message.
    pub async fn fail_run(
        &self,
        run_id: i64,
        error_message: &str,
        started_at: DateTime<Utc>,
        stats: &SyncStats,
    ) -> Result<bool> {
        self.finish_run(run_id, SyncStatus::Failed, Some(error_message), started_at, stats)
            .await
    }

    async fn finish_run(
        &self,
        run_id: i64,
        status: SyncStatus,
        error_message: Option<&str>,
        started_at: DateTime<Utc>,
        stats: &SyncStats,
    ) -> Result<bool> {
        let completed_at = Utc::now();
        let duration = (completed_at - started_at).max(Duration::zero()).num_seconds();

        let result = sqlx::query(
            r#"
            UPDATE sync_logs
            SET status = ?, error_message = ?, completed_at = ?, duration_seconds = ?,
                total_products_fetched = ?, products_created = ?, products_updated = ?,
                products_skipped = ?, products_failed = ?, total_batches = ?
            WHERE id = ? AND status = 'started'
            "#,
        )
        .bind(status)
        .bind(error_message)
        .bind(completed_at)
        .bind(duration)
        .bind(stats.total_products_fetched)
        .bind(stats.products_created)
        .bind(stats.products_updated)
        .bind(stats.products_skipped)
        .bind(stats.products_failed)
        .bind(stats.total_batches)
        .bind(run_id)
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_run(&self, run_id: i64) -> Result<Option<SyncRun>> {
        let row = sqlx::query(&format!("{SELECT_RUN} WHERE id = ?"))
            .bind(run_id)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(map_run).transpose()
    }

    /// Runs started inside the recency window, newest first.
    pub async fn recent(&self, days: i64) -> Result<Vec<SyncRun>> {
        let cutoff = Utc::now() - Duration::days(days);
        let rows = sqlx::query(&format!(
            "{SELECT_RUN} WHERE started_at >= ? ORDER BY started_at DESC"
        ))
        .bind(cutoff)
        .fetch_all(&*self.pool)
        .await?;
        rows.into_iter().map(map_run).collect()
    }

    pub async fn recent_by_status(&self, days: i64, status: SyncStatus) -> Result<Vec<SyncRun>> {
        let cutoff = Utc::now() - Duration::days(days);
        let rows = sqlx::query(&format!(
            "{SELECT_RUN} WHERE started_at >= ? AND status = ? ORDER BY started_at DESC"
        ))
        .bind(cutoff)
        .bind(status)
        .fetch_all(&*self.pool)
        .await?;
        rows.into_iter().map(map_run).collect()
    }

    pub async fn recent_by_type(&self, days: i64, sync_type: &str) -> Result<Vec<SyncRun>> {
        let cutoff = Utc::now() - Duration::days(days);
        let rows = sqlx::query(&format!(
            "{SELECT_RUN} WHERE started_at >= ? AND sync_type = ? ORDER BY started_at DESC"
        ))
        .bind(cutoff)
        .bind(sync_type)
        .fetch_all(&*self.pool)
        .await?;
        rows.into_iter().map(map_run).collect()
    }

    /// Aggregate over the window. Success rate and average duration are
    /// derived here, never read back from stored values.
    pub async fn stats(&self, days: i64) -> Result<LedgerStats> {
        let cutoff = Utc::now() - Duration::days(days);
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_syncs,
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS successful_syncs,
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed_syncs,
                COALESCE(SUM(total_products_fetched), 0) AS total_products,
                COALESCE(SUM(products_created), 0) AS total_created,
                COALESCE(SUM(products_updated), 0) AS total_updated,
                COALESCE(SUM(products_failed), 0) AS total_failed,
                COALESCE(AVG(CASE WHEN duration_seconds > 0 THEN duration_seconds END), 0.0) AS avg_duration
            FROM sync_logs
            WHERE started_at >= ?
            "#,
        )
        .bind(cutoff)
        .fetch_one(&*self.pool)
        .await?;

        let total_syncs: i64 = row.get("total_syncs");
        let successful_syncs: i64 = row.get("successful_syncs");
        let success_rate = if total_syncs > 0 {
            (successful_syncs as f64 / total_syncs as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        Ok(LedgerStats {
            total_syncs,
            successful_syncs,
            failed_syncs: row.get("failed_syncs"),
            success_rate,
            total_products: row.get("total_products"),
            total_created: row.get("total_created"),
            total_updated: row.get("total_updated"),
            total_failed: row.get("total_failed"),
            avg_duration_seconds: row.get("avg_duration"),
        })
    }
}

const SELECT_RUN: &str = r#"
    SELECT id, sync_type, status, total_products_fetched, products_created,
           products_updated, products_skipped, products_failed, total_batches,
           batch_id, error_message, sync_options, started_at, completed_at,
           duration_seconds
    FROM sync_logs
"#;

fn map_run(row: SqliteRow) -> Result<SyncRun> {
    let options_raw: Option<String> = row.get("sync_options");
    let sync_options = options_raw
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()?;

    Ok(SyncRun {
        id: row.get("id"),
        sync_type: row.get("sync_type"),
        status: row.get("status"),
        stats: SyncStats {
            total_products_fetched: row.get("total_products_fetched"),
            products_created: row.get("products_created"),
            products_updated: row.get("products_updated"),
            products_skipped: row.get("products_skipped"),
            products_failed: row.get("products_failed"),
            total_batches: row.get("total_batches"),
        },
        batch_id: row.get("batch_id"),
        error_message: row.get("error_message"),
        sync_options,
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        duration_seconds: row.get("duration_seconds"),
    })
}
