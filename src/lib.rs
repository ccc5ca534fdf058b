//! catalog-sync: batch product catalog synchronization
//!
//! Fetches a source catalog over HTTP, splits it into independently
//! dispatched batches of upsert work, records every run in a SQLite audit
//! ledger, and reports progress while a batch drains.
//!
//! Layering follows domain -> application -> infrastructure: `domain` holds
//! the plain data types, `application` the orchestration (batch coordinator,
//! run ledger, sync service), and `infrastructure` the HTTP, storage, and
//! configuration plumbing.

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
