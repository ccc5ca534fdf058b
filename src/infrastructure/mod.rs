//! Infrastructure layer: storage, HTTP, configuration, logging.

pub mod config;
pub mod database_connection;
pub mod http_client;
pub mod image_storage;
pub mod logging;
pub mod notifier;
pub mod product_repository;
pub mod sync_log_repository;

pub use config::AppConfig;
pub use database_connection::DatabaseConnection;
pub use http_client::{CatalogFetcher, FetchError, HttpCatalogFetcher, HttpClient, HttpClientConfig};
pub use image_storage::ImageStore;
pub use logging::init_logging;
pub use notifier::{LogNotifier, SyncNotifier};
pub use product_repository::{ProductDraft, ProductRepository};
pub use sync_log_repository::SyncLogRepository;
