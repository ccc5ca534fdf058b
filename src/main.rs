use catalog_sync::application::{
    BatchCoordinator, ProductSyncService, ProgressMonitor, SyncLedger, UpsertEngine,
};
use catalog_sync::cli::{self, Cli, Command};
use catalog_sync::infrastructure::{
    init_logging, AppConfig, DatabaseConnection, HttpCatalogFetcher, HttpClient, ImageStore,
    LogNotifier, ProductRepository, SyncLogRepository,
};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Builder;
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match Builder::new_multi_thread()
        .enable_all()
        .thread_name("sync-worker")
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to build async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.unwrap_or_else(AppConfig::default_config_path);
    let (mut config, config_created) = AppConfig::load_or_init(&config_path).await?;
    init_logging(&config.logging)?;
    if config_created {
        info!("Created default configuration at {}", config_path.display());
    }

    if let Command::Sync { batch_size, api_url } = &cli.command {
        if let Some(size) = batch_size {
            config.sync.batch_size = *size;
        }
        if let Some(url) = api_url {
            config.sync.api_url = url.clone();
        }
    }

    let db = DatabaseConnection::new(&config.database_url()).await?;
    db.migrate().await?;

    match cli.command {
        Command::Sync { .. } => {
            let http = Arc::new(HttpClient::new(config.http.clone())?);
            let fetcher = Arc::new(HttpCatalogFetcher::new(
                Arc::clone(&http),
                config.sync.api_url.clone(),
            ));
            let images = Arc::new(ImageStore::new(http, config.storage.storage_root.clone()));
            let engine = Arc::new(UpsertEngine::new(
                ProductRepository::new(db.pool().clone()),
                images,
            ));
            let service = ProductSyncService::new(
                fetcher,
                BatchCoordinator::new(engine, config.sync.worker_concurrency),
                SyncLedger::new(SyncLogRepository::new(db.pool().clone())),
                Arc::new(LogNotifier),
                ProgressMonitor::new(
                    Duration::from_millis(config.sync.monitor_poll_interval_ms),
                    config.sync.monitor_max_attempts,
                ),
                config.sync.api_url.clone(),
                config.sync.batch_size,
            );

            let report = service.sync_all_products().await?;
            cli::print_sync_report(&report);
        }
        Command::Logs { recent, stats, status, sync_type } => {
            let ledger = SyncLedger::new(SyncLogRepository::new(db.pool().clone()));
            cli::run_logs(&ledger, recent, stats, status.as_deref(), sync_type.as_deref()).await?;
        }
    }

    Ok(())
}
