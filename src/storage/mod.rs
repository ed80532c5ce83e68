pub mod articles;
pub mod catalog;
pub mod history;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use tracing::debug;

use crate::cli::config::StorageSettings;
use articles::{ArticleStore, PostgresArticleStore};
use catalog::Catalog;
use history::{PaginationTracker, PostgresPaginationTracker};

/// Handle to the persistence engine.
///
/// Holds a connection pool only; every mutating operation runs as a single
/// SQL statement acquired from the pool, so no session is ever held open
/// across a throttle sleep.
pub struct Database {
    pool: Pool<Postgres>,
}

impl Database {
    /// Connect to PostgreSQL and bootstrap the schema.
    pub async fn connect(settings: &StorageSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.connection_string)
            .await
            .context(format!(
                "Failed to connect to PostgreSQL: {}",
                settings.connection_string
            ))?;

        let database = Self { pool };
        database.ensure_schema().await?;

        debug!("Connected to PostgreSQL database");

        Ok(database)
    }

    /// Ensure all tables exist.
    async fn ensure_schema(&self) -> Result<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS newspapers (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS pages (
                id TEXT PRIMARY KEY,
                newspaper_id TEXT NOT NULL REFERENCES newspapers(id),
                parent_page_id TEXT REFERENCES pages(id),
                name TEXT NOT NULL,
                link_format TEXT,
                paginated BOOLEAN NOT NULL DEFAULT FALSE,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                position INTEGER NOT NULL DEFAULT 0
            )",
            "CREATE TABLE IF NOT EXISTS articles (
                id TEXT PRIMARY KEY,
                page_id TEXT NOT NULL REFERENCES pages(id),
                link TEXT NOT NULL,
                title TEXT NOT NULL,
                preview JSONB NOT NULL DEFAULT '{}'::jsonb,
                body TEXT,
                downloaded BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            "CREATE TABLE IF NOT EXISTS page_parsing_history (
                id BIGSERIAL PRIMARY KEY,
                page_id TEXT NOT NULL REFERENCES pages(id),
                page_number INTEGER NOT NULL,
                article_count INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            "CREATE INDEX IF NOT EXISTS page_parsing_history_cursor_idx
                ON page_parsing_history (page_id, created_at DESC)",
            "CREATE INDEX IF NOT EXISTS articles_pending_idx
                ON articles (page_id) WHERE NOT downloaded",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to bootstrap database schema")?;
        }

        debug!("Ensured database schema exists");

        Ok(())
    }

    /// Article records, behind the store trait the crawl worker uses.
    pub fn articles(&self) -> Arc<dyn ArticleStore> {
        Arc::new(PostgresArticleStore::new(self.pool.clone()))
    }

    /// Pagination-history log, behind the tracker trait.
    pub fn pagination(&self) -> Arc<dyn PaginationTracker> {
        Arc::new(PostgresPaginationTracker::new(self.pool.clone()))
    }

    /// Newspaper/page catalog used by the `run`, `sync` and `status` commands.
    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.pool.clone())
    }
}
