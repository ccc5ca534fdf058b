//! Application configuration
//!
//! JSON config file under the platform config dir, created with defaults on
//! first run. Operator-facing knobs (batch size, source URL) can be
//! overridden per invocation from the CLI without touching the file.

use crate::infrastructure::http_client::HttpClientConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

pub const DEFAULT_API_URL: &str = "https://fakestoreapi.com/products";
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub http: HttpClientConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Source catalog endpoint.
    pub api_url: String,
    /// Chunk size for batch dispatch.
    pub batch_size: usize,
    /// Concurrent units of work per batch.
    pub worker_concurrency: usize,
    /// Progress monitor refresh interval.
    pub monitor_poll_interval_ms: u64,
    /// Progress monitor attempt budget before giving up on a live batch.
    pub monitor_max_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            worker_concurrency: 8,
            monitor_poll_interval_ms: 2000,
            monitor_max_attempts: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database location; `sqlite:` prefix added when connecting.
    pub database_path: PathBuf,
    /// Root under which `products/` image files are stored.
    pub storage_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("catalog-sync");
        Self {
            database_path: data_dir.join("catalog.db"),
            storage_root: data_dir.join("storage"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset.
    pub level: String,
    /// Mirror logs into a daily-rotated file under `log_dir`.
    pub file_output: bool,
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), file_output: false, log_dir: None }
    }
}

impl AppConfig {
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("catalog-sync")
            .join("config.json")
    }

    /// Load the config file, writing defaults on first run. The flag is
    /// true when defaults were just written; the caller reports it once the
    /// log subscriber exists.
    pub async fn load_or_init(path: &PathBuf) -> Result<(Self, bool)> {
        if path.exists() {
            let raw = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: AppConfig = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid config file: {}", path.display()))?;
            Ok((config, false))
        } else {
            let config = AppConfig::default();
            config.save(path).await?;
            Ok((config, true))
        }
    }

    pub async fn save(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn database_url(&self) -> String {
        format!("sqlite:{}", self.storage.database_path.display())
    }
}
