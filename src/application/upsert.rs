//! Upsert engine: reconciles one source record into the local store
//!
//! Category resolution and the entity write are the only side effects; image
//! ingestion failure is non-fatal and falls back to the remote reference.

use crate::application::batch::RecordProcessor;
use crate::domain::entities::{SourceRecord, UpsertOutcome};
use crate::infrastructure::image_storage::ImageStore;
use crate::infrastructure::product_repository::{ProductDraft, ProductRepository};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub struct UpsertEngine {
    products: ProductRepository,
    images: Arc<ImageStore>,
}

impl UpsertEngine {
    pub fn new(products: ProductRepository, images: Arc<ImageStore>) -> Self {
        Self { products, images }
    }

    /// Create-or-update the entity for one record. Storage failures
    /// propagate; everything else resolves to an outcome.
    pub async fn process_record(&self, record: &SourceRecord) -> Result<UpsertOutcome> {
        let category_id = self.products.find_or_create_category(&record.category).await?;

        let image = if record.image.is_empty() {
            record.image.clone()
        } else {
            // Ingestion failure keeps the original remote reference.
            self.images
                .download_and_store(&record.image, &record.title)
                .await
                .unwrap_or_else(|| record.image.clone())
        };

        let rating = record
            .rating
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let draft = ProductDraft {
            source_id: Some(record.id),
            title: record.title.clone(),
            price: record.price,
            description: record.description.clone(),
            image,
            category_id,
            rating,
        };

        let outcome = self.products.upsert_product(&draft).await?;
        debug!(title = %record.title, outcome = %outcome, "Product processed");
        Ok(outcome)
    }
}

#[async_trait]
impl RecordProcessor for UpsertEngine {
    async fn process(&self, record: &SourceRecord) -> Result<UpsertOutcome> {
        self.process_record(record).await
    }
}
