//! Logging system initialization
//!
//! Console output through tracing-subscriber with an EnvFilter; optional
//! non-blocking file output with daily rotation. The file writer guard must
//! stay alive for the process lifetime.

use crate::infrastructure::config::LoggingConfig;
use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let console_layer = fmt::layer().with_target(false);

    if config.file_output {
        let log_dir = config
            .log_dir
            .clone()
            .unwrap_or_else(|| std::path::PathBuf::from("logs"));
        std::fs::create_dir_all(&log_dir)?;

        let file_appender = tracing_appender::rolling::daily(&log_dir, "catalog-sync.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);

        let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);

        Registry::default()
            .with(filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;
    } else {
        Registry::default()
            .with(filter)
            .with(console_layer)
            .try_init()?;
    }

    Ok(())
}
