use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use tracing::{debug, info};

use crate::cli::config::SourceConfig;
use crate::crawler::model::{Newspaper, Page, PageParsingHistory};

/// The newspaper/page catalog.
///
/// Written by the `sync` command from the configured source definitions and
/// read once per worker at startup; a crawl run never mutates it.
pub struct Catalog {
    pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct PageRow {
    id: String,
    newspaper_id: String,
    parent_page_id: Option<String>,
    name: String,
    link_format: Option<String>,
    paginated: bool,
}

impl Catalog {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Load a newspaper with its active pages in configured order.
    pub async fn load_newspaper(&self, newspaper_id: &str) -> Result<Option<Newspaper>> {
        let name: Option<String> =
            sqlx::query_scalar("SELECT name FROM newspapers WHERE id = $1")
                .bind(newspaper_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to query newspaper")?;

        let Some(name) = name else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, PageRow>(
            "SELECT id, newspaper_id, parent_page_id, name, link_format, paginated
             FROM pages
             WHERE newspaper_id = $1 AND active
             ORDER BY position",
        )
        .bind(newspaper_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query newspaper pages")?;

        let pages = rows
            .into_iter()
            .map(|row| Page {
                id: row.id,
                newspaper_id: row.newspaper_id,
                parent_page_id: row.parent_page_id,
                name: row.name,
                link_format: row.link_format,
                paginated: row.paginated,
            })
            .collect();

        Ok(Some(Newspaper {
            id: newspaper_id.to_string(),
            name,
            pages,
        }))
    }

    /// Upsert one configured source into the catalog.
    pub async fn sync_source(&self, source: &SourceConfig) -> Result<()> {
        sqlx::query(
            "INSERT INTO newspapers (id, name) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET name = $2",
        )
        .bind(&source.id)
        .bind(&source.name)
        .execute(&self.pool)
        .await
        .context(format!("Failed to upsert newspaper '{}'", source.id))?;

        for (position, page) in source.pages.iter().enumerate() {
            if let Some(parent_id) = &page.parent_page_id {
                let parent_is_top_level = source
                    .pages
                    .iter()
                    .any(|candidate| candidate.id == *parent_id && candidate.parent_page_id.is_none());
                if !parent_is_top_level {
                    anyhow::bail!(
                        "page '{}' of '{}' must parent to a top-level page of the same newspaper",
                        page.id,
                        source.id
                    );
                }
            }

            sqlx::query(
                "INSERT INTO pages (id, newspaper_id, parent_page_id, name, link_format,
                                    paginated, active, position)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (id) DO UPDATE
                 SET parent_page_id = $3, name = $4, link_format = $5,
                     paginated = $6, active = $7, position = $8",
            )
            .bind(&page.id)
            .bind(&source.id)
            .bind(&page.parent_page_id)
            .bind(&page.name)
            .bind(&page.link_format)
            .bind(page.paginated)
            .bind(page.active)
            .bind(position as i32)
            .execute(&self.pool)
            .await
            .context(format!("Failed to upsert page '{}'", page.id))?;
        }

        info!(
            "Synced source '{}' with {} pages into the catalog",
            source.id,
            source.pages.len()
        );

        Ok(())
    }

    /// Most recent parsing-history record for a page, if any.
    pub async fn latest_history(&self, page_id: &str) -> Result<Option<PageParsingHistory>> {
        #[derive(sqlx::FromRow)]
        struct HistoryRow {
            page_id: String,
            page_number: i32,
            article_count: i32,
            created_at: DateTime<Utc>,
        }

        let row = sqlx::query_as::<_, HistoryRow>(
            "SELECT page_id, page_number, article_count, created_at
             FROM page_parsing_history
             WHERE page_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )
        .bind(page_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query latest page parsing history")?;

        Ok(row.map(|row| PageParsingHistory {
            page_id: row.page_id,
            page_number: row.page_number,
            article_count: row.article_count,
            created_at: row.created_at,
        }))
    }

    /// Article totals for the `status` command: (total, pending body fetch).
    pub async fn article_counts(&self, newspaper_id: &str) -> Result<(i64, i64)> {
        let counts: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE NOT a.downloaded)
             FROM articles a
             JOIN pages p ON p.id = a.page_id
             WHERE p.newspaper_id = $1",
        )
        .bind(newspaper_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count articles")?;

        debug!(
            "Newspaper {} has {} articles ({} pending)",
            newspaper_id, counts.0, counts.1
        );

        Ok(counts)
    }
}
