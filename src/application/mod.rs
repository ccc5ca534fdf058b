//! Application layer: orchestration of fetch, dispatch, upsert, and audit.

pub mod batch;
pub mod ledger;
pub mod progress;
pub mod sync_service;
pub mod upsert;

pub use batch::{chunk_count, BatchCoordinator, BatchCounts, BatchHandle, RecordProcessor};
pub use ledger::{RunHandle, SyncLedger};
pub use progress::ProgressMonitor;
pub use sync_service::{ProductSyncService, SyncError, SyncReport};
pub use upsert::UpsertEngine;
