//! Domain layer: entities and run/batch state types.

pub mod batch;
pub mod entities;
pub mod sync_run;

pub use batch::BatchSnapshot;
pub use entities::{Category, Product, Rating, SourceRecord, UpsertOutcome};
pub use sync_run::{LedgerStats, SyncRun, SyncStats, SyncStatus};
