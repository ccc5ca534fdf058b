//! Command-line interface
//!
//! Two operator entry points: `sync` runs a full catalog synchronization,
//! `logs` inspects the run ledger. Both print human-readable summaries to
//! stdout while tracing carries the structured detail.

use crate::application::{SyncLedger, SyncReport};
use crate::domain::sync_run::{LedgerStats, SyncRun, SyncStatus};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Parser)]
#[command(name = "catalog-sync", version, about = "Product catalog synchronization")]
pub struct Cli {
    /// Path to the JSON config file (default: platform config dir).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the source catalog and synchronize all products.
    Sync {
        /// Override the configured chunk size for this run.
        #[arg(long)]
        batch_size: Option<usize>,
        /// Override the configured source endpoint for this run.
        #[arg(long)]
        api_url: Option<String>,
    },
    /// Inspect recent synchronization runs.
    Logs {
        /// Window in days.
        #[arg(long, default_value_t = 7)]
        recent: i64,
        /// Print aggregate statistics instead of individual runs.
        #[arg(long)]
        stats: bool,
        /// Filter by run status (started, completed, failed).
        #[arg(long)]
        status: Option<String>,
        /// Filter by sync type (e.g. full_sync).
        #[arg(long)]
        sync_type: Option<String>,
    },
}

pub fn print_sync_report(report: &SyncReport) {
    println!("Sync finished");
    println!("  Batch:   {}", report.snapshot.batch_id);
    println!("  Fetched: {}", report.stats.total_products_fetched);
    println!("  Created: {}", report.stats.products_created);
    println!("  Updated: {}", report.stats.products_updated);
    println!("  Skipped: {}", report.stats.products_skipped);
    println!("  Failed:  {}", report.stats.products_failed);
    if let Some(run) = &report.run {
        println!("  Duration: {}", run.duration_formatted());
    }
}

pub async fn run_logs(
    ledger: &SyncLedger,
    recent: i64,
    stats: bool,
    status: Option<&str>,
    sync_type: Option<&str>,
) -> Result<()> {
    if stats {
        let aggregate = ledger.stats(recent).await?;
        print_ledger_stats(recent, &aggregate);
        return Ok(());
    }

    let runs = match (status, sync_type) {
        (Some(_), Some(_)) => {
            anyhow::bail!("--status and --sync-type cannot be combined; pass one filter")
        }
        (Some(raw), None) => {
            let status = SyncStatus::from_str(raw).map_err(|e| anyhow::anyhow!(e))?;
            ledger.recent_by_status(recent, status).await?
        }
        (None, Some(kind)) => ledger.recent_by_type(recent, kind).await?,
        (None, None) => ledger.recent(recent).await?,
    };
    print_runs(recent, &runs);
    Ok(())
}

fn print_runs(days: i64, runs: &[SyncRun]) {
    if runs.is_empty() {
        println!("No sync runs in the last {days} day(s)");
        return;
    }
    println!(
        "{:<6} {:<12} {:<10} {:>8} {:>8} {:>8} {:>8} {:>10}  {}",
        "ID", "TYPE", "STATUS", "FETCHED", "CREATED", "UPDATED", "FAILED", "DURATION", "STARTED"
    );
    for run in runs {
        println!(
            "{:<6} {:<12} {:<10} {:>8} {:>8} {:>8} {:>8} {:>10}  {}",
            run.id,
            run.sync_type,
            run.status.as_str(),
            run.stats.total_products_fetched,
            run.stats.products_created,
            run.stats.products_updated,
            run.stats.products_failed,
            run.duration_formatted(),
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
        );
        if let Some(message) = &run.error_message {
            println!("       error: {message}");
        }
    }
}

fn print_ledger_stats(days: i64, stats: &LedgerStats) {
    println!("Sync statistics, last {days} day(s)");
    println!("  Total runs:      {}", stats.total_syncs);
    println!("  Successful:      {}", stats.successful_syncs);
    println!("  Failed:          {}", stats.failed_syncs);
    println!("  Success rate:    {:.2}%", stats.success_rate);
    println!("  Products seen:   {}", stats.total_products);
    println!("  Created:         {}", stats.total_created);
    println!("  Updated:         {}", stats.total_updated);
    println!("  Record failures: {}", stats.total_failed);
    println!("  Avg duration:    {}", format_seconds(stats.avg_duration_seconds));
}

/// Human-readable duration: `42.0s`, `3m 5.0s`, `1h 2m 3.5s`.
pub fn format_seconds(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let hours = (seconds / 3600.0) as u64;
    let minutes = ((seconds % 3600.0) / 60.0) as u64;
    let rest = seconds % 60.0;
    if hours > 0 {
        format!("{hours}h {minutes}m {rest:.1}s")
    } else if minutes > 0 {
        format!("{minutes}m {rest:.1}s")
    } else {
        format!("{rest:.1}s")
    }
}
