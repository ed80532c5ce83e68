use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::debug;

/// The append-only pagination-history log.
///
/// Records are never updated or deleted; the most recent record for a page
/// is the durable pagination cursor. Append and read-latest are race-tolerant
/// by construction: a stale read at worst re-fetches an already-seen page.
#[async_trait]
pub trait PaginationTracker: Send + Sync {
    /// Append one history record for a completed preview fetch
    async fn append_history(
        &self,
        page_id: &str,
        page_number: i32,
        article_count: i32,
    ) -> Result<()>;

    /// Page number of the most recent record for a page; 0 when none exists
    async fn latest_page_number(&self, page_id: &str) -> Result<i32>;
}

/// PostgreSQL implementation of PaginationTracker
pub struct PostgresPaginationTracker {
    pool: Pool<Postgres>,
}

impl PostgresPaginationTracker {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaginationTracker for PostgresPaginationTracker {
    async fn append_history(
        &self,
        page_id: &str,
        page_number: i32,
        article_count: i32,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO page_parsing_history (page_id, page_number, article_count)
             VALUES ($1, $2, $3)",
        )
        .bind(page_id)
        .bind(page_number)
        .bind(article_count)
        .execute(&self.pool)
        .await
        .context("Failed to append page parsing history")?;

        debug!(
            "Recorded parsing history for page {}: page_number={} articles={}",
            page_id, page_number, article_count
        );

        Ok(())
    }

    async fn latest_page_number(&self, page_id: &str) -> Result<i32> {
        // Latest by creation order; the serial id breaks same-timestamp ties.
        let latest: Option<i32> = sqlx::query_scalar(
            "SELECT page_number FROM page_parsing_history
             WHERE page_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )
        .bind(page_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query page parsing history")?;

        Ok(latest.unwrap_or(0))
    }
}
