use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cli::config::HarvesterConfig;
use crate::crawler::throttle::RateLimiter;
use crate::crawler::worker::CrawlWorker;
use crate::fetch::{HttpBodyFetcher, HttpPreviewFetcher};
use crate::storage::Database;

fn load_config(profile: Option<String>) -> Result<HarvesterConfig> {
    match profile {
        Some(name) => HarvesterConfig::load_profile(&name)
            .context(format!("Failed to load profile: {}", name)),
        None => HarvesterConfig::load_default(),
    }
}

/// Run one crawl worker per newspaper, forever.
pub async fn run(
    newspapers: Vec<String>,
    profile: Option<String>,
    min_delay: Option<u64>,
) -> Result<()> {
    let mut config = load_config(profile)?;

    if let Some(ms) = min_delay {
        config.crawler.min_delay_ms = ms;
    }

    let database = Database::connect(&config.storage).await?;
    let catalog = database.catalog();

    let client = reqwest::Client::builder()
        .user_agent(&config.crawler.user_agent)
        .timeout(Duration::from_secs(config.crawler.request_timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    let previews = Arc::new(HttpPreviewFetcher::new(client.clone(), &config.sources));
    let bodies = Arc::new(HttpBodyFetcher::new(client, &config.sources));

    let mut handles = Vec::new();

    for newspaper_id in newspapers {
        let newspaper = catalog
            .load_newspaper(&newspaper_id)
            .await?
            .ok_or_else(|| {
                anyhow!(
                    "newspaper '{}' not found in the catalog; run `harvester sync` first",
                    newspaper_id
                )
            })?;

        if config.source(&newspaper_id).is_none() {
            warn!(
                "No source definition for '{}'; its fetches will fail until one is configured",
                newspaper_id
            );
        }

        info!(
            "Starting worker for {} ({} pages)",
            newspaper.name,
            newspaper.pages.len()
        );

        // Each worker gets its own rate limiter; throttling is per newspaper.
        let worker = CrawlWorker::new(
            newspaper,
            database.articles(),
            database.pagination(),
            previews.clone(),
            bodies.clone(),
            RateLimiter::new(Duration::from_millis(config.crawler.min_delay_ms)),
        );

        handles.push(tokio::spawn(worker.run()));
    }

    supervise(handles).await
}

/// Wait on the workers and surface the first failure.
///
/// Workers run forever, so any completion is abnormal: the process exits as
/// soon as one worker dies and the service supervisor restarts it, instead of
/// limping on with a silently reduced set of newspapers.
async fn supervise(handles: Vec<JoinHandle<Result<()>>>) -> Result<()> {
    let (first, _, _) = futures::future::select_all(handles).await;
    match first {
        Ok(Ok(())) => Err(anyhow!("a crawl worker exited unexpectedly")),
        Ok(Err(e)) => Err(e).context("a crawl worker terminated"),
        Err(join_error) => Err(anyhow!(join_error)).context("a crawl worker panicked"),
    }
}

/// Upsert the configured sources into the catalog.
pub async fn sync(profile: Option<String>) -> Result<()> {
    let config = load_config(profile)?;

    if config.sources.is_empty() {
        warn!("No sources configured; nothing to sync");
        return Ok(());
    }

    let database = Database::connect(&config.storage).await?;
    let catalog = database.catalog();

    for source in &config.sources {
        catalog.sync_source(source).await?;
    }

    info!("Synced {} sources", config.sources.len());

    Ok(())
}

/// Show article counts for a newspaper.
pub async fn status(newspaper_id: String, profile: Option<String>) -> Result<()> {
    let config = load_config(profile)?;
    let database = Database::connect(&config.storage).await?;
    let catalog = database.catalog();

    let newspaper = catalog
        .load_newspaper(&newspaper_id)
        .await?
        .ok_or_else(|| anyhow!("newspaper '{}' not found in the catalog", newspaper_id))?;

    let (total, pending) = catalog.article_counts(&newspaper_id).await?;

    println!("Newspaper: {} ({})", newspaper.name, newspaper.id);
    println!("Active Pages: {}", newspaper.pages.len());
    println!("Articles Stored: {}", total);
    println!("Awaiting Body Fetch: {}", pending);

    println!("Pagination Cursors:");
    for page in &newspaper.pages {
        match catalog.latest_history(&page.id).await? {
            Some(history) => println!(
                "  - {}: page {} ({} new articles at {})",
                page.name, history.page_number, history.article_count, history.created_at
            ),
            None => println!("  - {}: never fetched", page.name),
        }
    }

    Ok(())
}

/// List all available configuration profiles
pub fn list_profiles() -> Result<()> {
    let profiles = HarvesterConfig::list_profiles()?;

    println!("Available configuration profiles:");
    for profile in profiles {
        println!("  - {}", profile);
    }

    Ok(())
}

/// Manage a specific configuration profile
pub fn manage_profile(profile_name: String) -> Result<()> {
    match HarvesterConfig::load_profile(&profile_name) {
        Ok(config) => {
            println!("Profile: {}", profile_name);
            println!("{:#?}", config);
        }
        Err(_) => {
            warn!(
                "Profile '{}' does not exist. Creating a default profile.",
                profile_name
            );
            let config = HarvesterConfig::default();
            config.save_as_profile(&profile_name)?;
            println!("Created default profile: {}", profile_name);
        }
    }

    Ok(())
}

/// Show the current configuration
pub fn show_config() -> Result<()> {
    let config = HarvesterConfig::load_default()?;
    println!("Current configuration:");
    println!("{:#?}", config);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn supervise_fails_as_soon_as_one_worker_dies() {
        // One healthy worker still running, one that errors out.
        let healthy = tokio::spawn(async {
            std::future::pending::<()>().await;
            Ok(())
        });
        let broken = tokio::spawn(async { Err(anyhow!("no fetchable pages")) });

        let err = supervise(vec![healthy, broken]).await.unwrap_err();
        assert!(format!("{:#}", err).contains("no fetchable pages"));
    }

    #[tokio::test]
    async fn supervise_treats_a_clean_worker_exit_as_abnormal() {
        let finished = tokio::spawn(async { Ok(()) });

        let err = supervise(vec![finished]).await.unwrap_err();
        assert!(err.to_string().contains("exited unexpectedly"));
    }
}
