// Database connection and pool management
// This module handles SQLite database connections using sqlx

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Create database file directory if it doesn't exist
        let db_path = if database_url.starts_with("sqlite://") {
            database_url.trim_start_matches("sqlite://")
        } else if database_url.starts_with("sqlite:") {
            database_url.trim_start_matches("sqlite:")
        } else {
            database_url
        };

        if db_path != ":memory:" {
            if let Some(parent) = Path::new(db_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            if !Path::new(db_path).exists() {
                std::fs::File::create(db_path)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_categories_sql = r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
        "#;

        let create_products_sql = r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id INTEGER,
                title TEXT NOT NULL UNIQUE,
                price REAL NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                image TEXT NOT NULL DEFAULT '',
                category_id INTEGER NOT NULL,
                rating TEXT,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (category_id) REFERENCES categories (id)
            )
        "#;

        let create_sync_logs_sql = r#"
            CREATE TABLE IF NOT EXISTS sync_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sync_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'started',
                total_products_fetched INTEGER NOT NULL DEFAULT 0,
                products_created INTEGER NOT NULL DEFAULT 0,
                products_updated INTEGER NOT NULL DEFAULT 0,
                products_skipped INTEGER NOT NULL DEFAULT 0,
                products_failed INTEGER NOT NULL DEFAULT 0,
                total_batches INTEGER NOT NULL DEFAULT 0,
                batch_id TEXT,
                error_message TEXT,
                sync_options TEXT,
                started_at DATETIME NOT NULL,
                completed_at DATETIME,
                duration_seconds INTEGER
            )
        "#;

        let create_indexes_sql = r#"
            CREATE INDEX IF NOT EXISTS idx_products_source_id ON products (source_id);
            CREATE INDEX IF NOT EXISTS idx_products_category_id ON products (category_id);
            CREATE INDEX IF NOT EXISTS idx_sync_logs_type_status ON sync_logs (sync_type, status);
            CREATE INDEX IF NOT EXISTS idx_sync_logs_started_at ON sync_logs (started_at);
            CREATE INDEX IF NOT EXISTS idx_sync_logs_batch_id ON sync_logs (batch_id);
        "#;

        sqlx::query(create_categories_sql).execute(&self.pool).await?;
        sqlx::query(create_products_sql).execute(&self.pool).await?;
        sqlx::query(create_sync_logs_sql).execute(&self.pool).await?;
        for statement in create_indexes_sql.split(';') {
            let statement = statement.trim();
            if !statement.is_empty() {
                sqlx::query(statement).execute(&self.pool).await?;
            }
        }

        Ok(())
    }
}
