use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Pool, Postgres};
use tracing::debug;

use crate::crawler::model::Article;

/// Create/read/update/delete of article records.
///
/// Every mutating call is one atomic statement: it either takes full effect
/// or none, and the boolean result reports whether a row actually changed.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Whether an article with this identity is already stored
    async fn exists(&self, id: &str) -> Result<bool>;

    /// Insert a new article; false when the identity was already present
    async fn insert(&self, article: &Article) -> Result<bool>;

    /// Persist the body/downloaded mutation of a fetched article
    async fn update(&self, article: &Article) -> Result<bool>;

    /// Delete an article record permanently
    async fn delete(&self, article: &Article) -> Result<bool>;

    /// Articles of a newspaper whose body has not been fetched yet,
    /// oldest first
    async fn find_unfinished(&self, newspaper_id: &str) -> Result<Vec<Article>>;
}

/// PostgreSQL implementation of ArticleStore
pub struct PostgresArticleStore {
    pool: Pool<Postgres>,
}

impl PostgresArticleStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: String,
    page_id: String,
    link: String,
    title: String,
    preview: Json<serde_json::Value>,
    body: Option<String>,
    downloaded: bool,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            page_id: row.page_id,
            link: row.link,
            title: row.title,
            preview: row.preview.0,
            body: row.body,
            downloaded: row.downloaded,
        }
    }
}

#[async_trait]
impl ArticleStore for PostgresArticleStore {
    async fn exists(&self, id: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM articles WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .context("Failed to check for existing article")?;

        Ok(exists)
    }

    async fn insert(&self, article: &Article) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO articles (id, page_id, link, title, preview, body, downloaded)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&article.id)
        .bind(&article.page_id)
        .bind(&article.link)
        .bind(&article.title)
        .bind(Json(&article.preview))
        .bind(&article.body)
        .bind(article.downloaded)
        .execute(&self.pool)
        .await
        .context("Failed to insert article")?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            debug!("Inserted article {}", article.id);
        }

        Ok(inserted)
    }

    async fn update(&self, article: &Article) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE articles SET body = $2, downloaded = $3 WHERE id = $1",
        )
        .bind(&article.id)
        .bind(&article.body)
        .bind(article.downloaded)
        .execute(&self.pool)
        .await
        .context("Failed to update article")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, article: &Article) -> Result<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(&article.id)
            .execute(&self.pool)
            .await
            .context("Failed to delete article")?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            debug!("Deleted article {}", article.id);
        }

        Ok(deleted)
    }

    async fn find_unfinished(&self, newspaper_id: &str) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            "SELECT a.id, a.page_id, a.link, a.title, a.preview, a.body, a.downloaded
             FROM articles a
             JOIN pages p ON p.id = a.page_id
             WHERE p.newspaper_id = $1 AND NOT a.downloaded
             ORDER BY a.created_at",
        )
        .bind(newspaper_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query unfinished articles")?;

        Ok(rows.into_iter().map(Article::from).collect())
    }
}
