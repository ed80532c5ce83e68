use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::crawler::model::{Article, Newspaper, Page};
use crate::crawler::scheduler::WorkList;
use crate::crawler::throttle::RateLimiter;
use crate::fetch::{BodyFetcher, PreviewFetcher};
use crate::storage::articles::ArticleStore;
use crate::storage::history::PaginationTracker;

/// Page number recorded for pages that are not paginated
const NOT_APPLICABLE_PAGE_NUMBER: i32 = 0;

/// Counters for one pass over the work-list, logged when the pass ends
#[derive(Debug, Default)]
struct PassStats {
    pages_fetched: usize,
    pages_skipped: usize,
    articles_inserted: usize,
    articles_downloaded: usize,
    articles_dropped: usize,
}

/// The crawl worker for one newspaper.
///
/// Runs a single sequential control flow: builds the work-list once, drains
/// the backlog of articles left without a body by a previous run, then loops
/// over shuffled passes of the work-list forever. The rate limiter is the
/// only suspension point shared by every network call the worker makes.
pub struct CrawlWorker {
    newspaper: Newspaper,
    articles: Arc<dyn ArticleStore>,
    tracker: Arc<dyn PaginationTracker>,
    previews: Arc<dyn PreviewFetcher>,
    bodies: Arc<dyn BodyFetcher>,
    limiter: RateLimiter,
}

impl CrawlWorker {
    pub fn new(
        newspaper: Newspaper,
        articles: Arc<dyn ArticleStore>,
        tracker: Arc<dyn PaginationTracker>,
        previews: Arc<dyn PreviewFetcher>,
        bodies: Arc<dyn BodyFetcher>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            newspaper,
            articles,
            tracker,
            previews,
            bodies,
            limiter,
        }
    }

    /// Run the crawl loop forever.
    ///
    /// Returns only on a fatal startup condition (an empty work-list); every
    /// per-item failure inside the loop is logged and skipped.
    pub async fn run(mut self) -> Result<()> {
        let work_list = WorkList::build(&self.newspaper);
        if work_list.is_empty() {
            anyhow::bail!(
                "newspaper '{}' has no fetchable pages; nothing to crawl",
                self.newspaper.id
            );
        }

        info!(
            "Crawling '{}': {} fetchable pages",
            self.newspaper.name,
            work_list.len()
        );

        self.drain_backlog().await;

        loop {
            let mut stats = PassStats::default();

            for page in work_list.shuffled_pass() {
                if let Err(e) = self.crawl_page(&page, &mut stats).await {
                    // Persistence failures surface here; the page's work is
                    // treated as not completed and the loop moves on.
                    error!("Page {} not completed: {:#}", page.id, e);
                    stats.pages_skipped += 1;
                }
            }

            info!(
                "Pass over '{}' complete: {} pages fetched, {} skipped, {} articles inserted, {} downloaded, {} dropped",
                self.newspaper.name,
                stats.pages_fetched,
                stats.pages_skipped,
                stats.articles_inserted,
                stats.articles_downloaded,
                stats.articles_dropped,
            );
        }
    }

    /// Body-fetch every article left without a body by a prior run.
    async fn drain_backlog(&mut self) {
        let backlog = match self.articles.find_unfinished(&self.newspaper.id).await {
            Ok(backlog) => backlog,
            Err(e) => {
                error!("Could not query unfinished articles: {:#}", e);
                return;
            }
        };

        if backlog.is_empty() {
            return;
        }

        info!(
            "Draining backlog of {} articles without a body for '{}'",
            backlog.len(),
            self.newspaper.name
        );

        let mut stats = PassStats::default();
        self.fetch_bodies(&backlog, &mut stats).await;
    }

    /// One page of one pass: preview fetch, dedup-insert, history record,
    /// body fetches for the newly inserted articles.
    async fn crawl_page(&mut self, page: &Page, stats: &mut PassStats) -> Result<()> {
        let page_number = if page.paginated {
            let last_parsed = self
                .tracker
                .latest_page_number(&page.id)
                .await
                .context("Failed to read pagination cursor")?;
            last_parsed + 1
        } else {
            NOT_APPLICABLE_PAGE_NUMBER
        };

        self.limiter.wait_turn().await;

        let candidates = match self.previews.fetch(page, page_number).await {
            Ok(candidates) => candidates,
            Err(err) if err.advances_cursor() => {
                // Nothing new on this page; a zero-count record still moves
                // the cursor so the same page number is not re-fetched forever.
                warn!("Preview of page {} was empty: {}", page.id, err);
                self.tracker
                    .append_history(&page.id, page_number, 0)
                    .await
                    .context("Failed to record empty preview fetch")?;
                stats.pages_fetched += 1;
                return Ok(());
            }
            Err(err) => {
                // No history record: the next pass retries this page number.
                warn!("Skipping page {} this pass: {}", page.id, err);
                stats.pages_skipped += 1;
                return Ok(());
            }
        };

        let mut fresh = Vec::new();
        for candidate in candidates {
            if self
                .articles
                .exists(&candidate.id)
                .await
                .context("Failed to check for existing article")?
            {
                continue;
            }
            if self
                .articles
                .insert(&candidate)
                .await
                .context("Failed to insert article")?
            {
                fresh.push(candidate);
            }
        }

        self.tracker
            .append_history(&page.id, page_number, fresh.len() as i32)
            .await
            .context("Failed to record preview fetch")?;

        stats.pages_fetched += 1;
        stats.articles_inserted += fresh.len();

        self.fetch_bodies(&fresh, stats).await;

        Ok(())
    }

    /// Body-fetch the given articles in order, classifying each failure.
    async fn fetch_bodies(&mut self, targets: &[Article], stats: &mut PassStats) {
        for article in targets {
            if let Err(e) = self.fetch_body(article, stats).await {
                error!("Article {} not completed: {:#}", article.id, e);
            }
        }
    }

    async fn fetch_body(&mut self, article: &Article, stats: &mut PassStats) -> Result<()> {
        self.limiter.wait_turn().await;

        match self.bodies.fetch(article).await {
            Ok(fetched) => {
                self.articles
                    .update(&fetched)
                    .await
                    .context("Failed to persist fetched article body")?;
                stats.articles_downloaded += 1;
            }
            Err(err) if err.is_permanent() => {
                warn!("Dropping article {}: {}", article.id, err);
                self.articles
                    .delete(article)
                    .await
                    .context("Failed to delete unusable article")?;
                stats.articles_dropped += 1;
            }
            Err(err) => {
                // Record stays as-is (not downloaded); the backlog drain of a
                // later run picks it up again.
                warn!("Deferring article {}: {}", article.id, err);
            }
        }

        Ok(())
    }
}
