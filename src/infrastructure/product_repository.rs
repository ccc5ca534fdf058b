//! Repository for products and categories
//!
//! Reconciliation writes go through here: categories are created with an
//! atomic find-or-create and products are upserted by their natural key
//! (exact title). Writes are safe under concurrent units of work; concurrent
//! updates to the same title are last-writer-wins.

use crate::domain::entities::{Category, Product, UpsertOutcome};
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Field set written on every upsert. The row id and created_at are owned by
/// the store.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub source_id: Option<i64>,
    pub title: String,
    pub price: f64,
    pub description: String,
    pub image: String,
    pub category_id: i64,
    pub rating: Option<String>,
}

#[derive(Clone)]
pub struct ProductRepository {
    pool: Arc<SqlitePool>,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Find a category by exact name or create it. Atomic under concurrent
    /// callers: the unique index plus `INSERT OR IGNORE` guarantees a single
    /// row per name.
    pub async fn find_or_create_category(&self, name: &str) -> Result<i64> {
        sqlx::query("INSERT OR IGNORE INTO categories (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(Utc::now())
            .execute(&*self.pool)
            .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM categories WHERE name = ?")
            .bind(name)
            .fetch_one(&*self.pool)
            .await
            .with_context(|| format!("Category row missing after insert: {name}"))?;

        Ok(id)
    }

    pub async fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let row = sqlx::query("SELECT id, name, created_at FROM categories WHERE name = ?")
            .bind(name)
            .fetch_optional(&*self.pool)
            .await?;

        Ok(row.map(|row| Category {
            id: row.get("id"),
            name: row.get("name"),
            created_at: row.get("created_at"),
        }))
    }

    /// Insert or update one product by its natural key and report which. The
    /// insert path carries an `ON CONFLICT(title)` update so a racing sibling
    /// unit degrades to last-writer-wins instead of erroring.
    pub async fn upsert_product(&self, draft: &ProductDraft) -> Result<UpsertOutcome> {
        let now = Utc::now();
        let existing = self.get_product_by_title(&draft.title).await?;

        if existing.is_some() {
            sqlx::query(
                r#"
                UPDATE products
                SET source_id = ?, price = ?, description = ?, image = ?,
                    category_id = ?, rating = ?, updated_at = ?
                WHERE title = ?
                "#,
            )
            .bind(draft.source_id)
            .bind(draft.price)
            .bind(&draft.description)
            .bind(&draft.image)
            .bind(draft.category_id)
            .bind(&draft.rating)
            .bind(now)
            .bind(&draft.title)
            .execute(&*self.pool)
            .await?;
            return Ok(UpsertOutcome::Updated);
        }

        sqlx::query(
            r#"
            INSERT INTO products
            (source_id, title, price, description, image, category_id, rating, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(title) DO UPDATE SET
                source_id = excluded.source_id,
                price = excluded.price,
                description = excluded.description,
                image = excluded.image,
                category_id = excluded.category_id,
                rating = excluded.rating,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(draft.source_id)
        .bind(&draft.title)
        .bind(draft.price)
        .bind(&draft.description)
        .bind(&draft.image)
        .bind(draft.category_id)
        .bind(&draft.rating)
        .bind(now)
        .bind(now)
        .execute(&*self.pool)
        .await?;

        Ok(UpsertOutcome::Created)
    }

    pub async fn get_product_by_title(&self, title: &str) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, source_id, title, price, description, image, category_id, rating,
                   created_at, updated_at
            FROM products WHERE title = ?
            "#,
        )
        .bind(title)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.map(|row| Product {
            id: row.get("id"),
            source_id: row.get("source_id"),
            title: row.get("title"),
            price: row.get("price"),
            description: row.get("description"),
            image: row.get("image"),
            category_id: row.get("category_id"),
            rating: row.get("rating"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    pub async fn count_products(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&*self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_categories(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&*self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use tempfile::tempdir;

    async fn test_repo() -> (tempfile::TempDir, ProductRepository) {
        let dir = tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("repo.db").display());
        let db = DatabaseConnection::new(&url).await.unwrap();
        db.migrate().await.unwrap();
        (dir, ProductRepository::new(db.pool().clone()))
    }

    fn draft(title: &str, price: f64, category_id: i64) -> ProductDraft {
        ProductDraft {
            source_id: Some(1),
            title: title.to_string(),
            price,
            description: "desc".to_string(),
            image: "https://example.com/a.jpg".to_string(),
            category_id,
            rating: Some(r#"{"rate":4.5,"count":100}"#.to_string()),
        }
    }

    #[tokio::test]
    async fn category_find_or_create_is_idempotent() {
        let (_dir, repo) = test_repo().await;

        let a = repo.find_or_create_category("electronics").await.unwrap();
        let b = repo.find_or_create_category("electronics").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(repo.count_categories().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn category_create_is_race_safe() {
        let (_dir, repo) = test_repo().await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.find_or_create_category("jewelery").await.unwrap()
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(repo.count_categories().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_creates_then_updates_by_title() {
        let (_dir, repo) = test_repo().await;
        let category = repo.find_or_create_category("electronics").await.unwrap();

        let outcome = repo.upsert_product(&draft("Widget", 10.0, category)).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);

        let outcome = repo.upsert_product(&draft("Widget", 15.0, category)).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);

        assert_eq!(repo.count_products().await.unwrap(), 1);
        let stored = repo.get_product_by_title("Widget").await.unwrap().unwrap();
        assert_eq!(stored.price, 15.0);
    }

    #[tokio::test]
    async fn titles_are_case_sensitive_keys() {
        let (_dir, repo) = test_repo().await;
        let category = repo.find_or_create_category("electronics").await.unwrap();

        repo.upsert_product(&draft("Widget", 10.0, category)).await.unwrap();
        repo.upsert_product(&draft("widget", 12.0, category)).await.unwrap();
        assert_eq!(repo.count_products().await.unwrap(), 2);
    }
}
