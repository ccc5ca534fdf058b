//! Core entity types for the catalog sync pipeline
//!
//! SourceRecord mirrors the wire shape of the external catalog API and is
//! transient; Product and Category are the persisted local entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rating sub-object as delivered by the source catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub rate: f64,
    pub count: i64,
}

/// One catalog entry as fetched from the source API. Never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: i64,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    pub category: String,
    pub rating: Option<Rating>,
}

/// Persisted catalog item. Natural key is the exact title string; the source
/// id is stored alongside as a secondary, non-unique identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub source_id: Option<i64>,
    pub title: String,
    pub price: f64,
    pub description: String,
    /// Local `/storage/products/..` path when image ingestion succeeded,
    /// otherwise the original remote URL.
    pub image: String,
    pub category_id: i64,
    /// Serialized rating JSON as fetched.
    pub rating: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category row, keyed by exact name. Created lazily, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of reconciling one source record into the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Skipped,
    Failed,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
            UpsertOutcome::Skipped => "skipped",
            UpsertOutcome::Failed => "failed",
        }
    }
}

impl std::fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
