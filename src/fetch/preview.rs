use anyhow::anyhow;
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, trace};
use url::Url;

use crate::cli::config::{SelectorSettings, SourceConfig};
use crate::crawler::error::PreviewError;
use crate::crawler::model::{Article, Page};
use crate::fetch::PreviewFetcher;

/// HTTP preview-page fetcher driven by per-newspaper selector profiles.
pub struct HttpPreviewFetcher {
    client: reqwest::Client,

    /// Selector profile per newspaper id
    profiles: HashMap<String, SourceProfile>,
}

/// The pieces of a source definition the fetchers need at run time
#[derive(Clone)]
pub(crate) struct SourceProfile {
    pub base_url: String,
    pub selectors: SelectorSettings,
}

impl HttpPreviewFetcher {
    pub fn new(client: reqwest::Client, sources: &[SourceConfig]) -> Self {
        let profiles = sources
            .iter()
            .map(|source| {
                (
                    source.id.clone(),
                    SourceProfile {
                        base_url: source.base_url.clone(),
                        selectors: source.selectors.clone(),
                    },
                )
            })
            .collect();

        Self { client, profiles }
    }

    /// Build the absolute preview-page URL from the page's link template.
    ///
    /// Paginated templates must carry a `{page}` placeholder; non-paginated
    /// templates are used as-is.
    fn build_page_url(
        profile: &SourceProfile,
        page: &Page,
        page_number: i32,
    ) -> Result<Url, PreviewError> {
        let template = page
            .link_format
            .as_deref()
            .ok_or_else(|| PreviewError::LinkBuildFailed(page.id.clone()))?;

        let path = if page.paginated {
            if !template.contains("{page}") {
                return Err(PreviewError::LinkBuildFailed(page.id.clone()));
            }
            template.replace("{page}", &page_number.to_string())
        } else {
            template.to_string()
        };

        let base = Url::parse(&profile.base_url)
            .map_err(|_| PreviewError::LinkBuildFailed(page.id.clone()))?;

        base.join(&path)
            .map_err(|_| PreviewError::LinkBuildFailed(page.id.clone()))
    }
}

#[async_trait]
impl PreviewFetcher for HttpPreviewFetcher {
    async fn fetch(&self, page: &Page, page_number: i32) -> Result<Vec<Article>, PreviewError> {
        let profile = self
            .profiles
            .get(&page.newspaper_id)
            .ok_or_else(|| PreviewError::SourceNotConfigured(page.newspaper_id.clone()))?;

        let page_url = Self::build_page_url(profile, page, page_number)?;
        debug!("Fetching preview page {}", page_url);

        let response = self
            .client
            .get(page_url.clone())
            .send()
            .await
            .map_err(|e| PreviewError::Unclassified(anyhow!(e).context("preview request failed")))?;

        if !response.status().is_success() {
            return Err(PreviewError::Unclassified(anyhow!(
                "preview request to {} returned {}",
                page_url,
                response.status()
            )));
        }

        let document = response
            .text()
            .await
            .map_err(|e| PreviewError::Unclassified(anyhow!(e).context("preview body unreadable")))?;

        if document.trim().is_empty() {
            return Err(PreviewError::MalformedDocument(page_url.to_string()));
        }

        parse_preview_document(&document, page, profile, &page_url)
    }
}

/// Extract article stubs from a preview document.
///
/// Kept synchronous so the parsed DOM never lives across an await point.
fn parse_preview_document(
    document: &str,
    page: &Page,
    profile: &SourceProfile,
    page_url: &Url,
) -> Result<Vec<Article>, PreviewError> {
    let selectors = &profile.selectors;
    let unavailable = || PreviewError::ParserUnavailable(page.newspaper_id.clone());

    let block_selector = Selector::parse(&selectors.preview_block).map_err(|_| unavailable())?;
    let link_selector = Selector::parse(&selectors.article_link).map_err(|_| unavailable())?;
    let title_selector = Selector::parse(&selectors.article_title).map_err(|_| unavailable())?;
    let image_selector = selectors
        .preview_image
        .as_deref()
        .map(Selector::parse)
        .transpose()
        .map_err(|_| unavailable())?;
    let date_selector = selectors
        .publication_date
        .as_deref()
        .map(Selector::parse)
        .transpose()
        .map_err(|_| unavailable())?;

    let html = Html::parse_document(document);
    let mut articles = Vec::new();

    for block in html.select(&block_selector) {
        let link_target = block
            .select(&link_selector)
            .next()
            .and_then(|element| element.value().attr(&selectors.link_attr));

        let link = match link_target.and_then(|target| page_url.join(target).ok()) {
            Some(mut url) => {
                url.set_fragment(None);
                url.to_string()
            }
            None => {
                trace!("Skipping preview block without a usable link on {}", page_url);
                continue;
            }
        };

        let title = match block.select(&title_selector).next() {
            Some(element) => element.text().collect::<String>().trim().to_string(),
            None => continue,
        };
        if title.is_empty() {
            continue;
        }

        let image = image_selector.as_ref().and_then(|selector| {
            block
                .select(selector)
                .next()
                .and_then(|element| element.value().attr("src"))
                .map(str::to_string)
        });

        let published = date_selector.as_ref().and_then(|selector| {
            block
                .select(selector)
                .next()
                .map(|element| element.text().collect::<String>().trim().to_string())
        });

        articles.push(Article {
            // Identity is the canonical article link; dedup keys on it.
            id: link.clone(),
            page_id: page.id.clone(),
            link,
            title,
            preview: json!({ "image": image, "published": published }),
            body: None,
            downloaded: false,
        });
    }

    if articles.is_empty() {
        return Err(PreviewError::EmptyResultSet(page_url.to_string()));
    }

    debug!("Parsed {} article previews from {}", articles.len(), page_url);

    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::SelectorSettings;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn selectors() -> SelectorSettings {
        SelectorSettings {
            preview_block: "div.story-card".to_string(),
            article_link: "a.story-link".to_string(),
            link_attr: "href".to_string(),
            article_title: "h2.story-title".to_string(),
            preview_image: Some("img.story-image".to_string()),
            publication_date: Some("span.story-date".to_string()),
            article_body: "div.article-content p".to_string(),
        }
    }

    fn source(base_url: &str) -> SourceConfig {
        SourceConfig {
            id: "np".to_string(),
            name: "Test Paper".to_string(),
            base_url: base_url.to_string(),
            selectors: selectors(),
            pages: vec![],
        }
    }

    fn page(id: &str, link_format: Option<&str>, paginated: bool) -> Page {
        Page {
            id: id.to_string(),
            newspaper_id: "np".to_string(),
            parent_page_id: None,
            name: id.to_string(),
            link_format: link_format.map(str::to_string),
            paginated,
        }
    }

    const SECTION_HTML: &str = r#"
        <html><body>
          <div class="story-card">
            <a class="story-link" href="/news/first-story">
              <h2 class="story-title">First Story</h2>
            </a>
            <span class="story-date">2019-05-01</span>
          </div>
          <div class="story-card">
            <a class="story-link" href="/news/second-story#comments">
              <h2 class="story-title">Second Story</h2>
            </a>
          </div>
        </body></html>
    "#;

    #[tokio::test]
    async fn extracts_article_stubs_with_absolute_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/front"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SECTION_HTML))
            .mount(&server)
            .await;

        let fetcher =
            HttpPreviewFetcher::new(reqwest::Client::new(), &[source(&server.uri())]);

        let articles = fetcher
            .fetch(&page("front", Some("/front"), false), 0)
            .await
            .unwrap();

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "First Story");
        assert_eq!(articles[0].link, format!("{}/news/first-story", server.uri()));
        assert_eq!(articles[0].id, articles[0].link);
        assert!(!articles[0].downloaded);
        // Fragments are stripped from the canonical link.
        assert_eq!(
            articles[1].link,
            format!("{}/news/second-story", server.uri())
        );
        assert_eq!(articles[0].preview["published"], "2019-05-01");
    }

    #[tokio::test]
    async fn paginated_template_substitutes_the_page_number() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/archive"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SECTION_HTML))
            .mount(&server)
            .await;

        let fetcher =
            HttpPreviewFetcher::new(reqwest::Client::new(), &[source(&server.uri())]);

        let articles = fetcher
            .fetch(&page("archive", Some("/archive?page={page}"), true), 3)
            .await
            .unwrap();

        assert_eq!(articles.len(), 2);
    }

    #[tokio::test]
    async fn page_without_articles_is_an_empty_result_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quiet"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body></body></html>"),
            )
            .mount(&server)
            .await;

        let fetcher =
            HttpPreviewFetcher::new(reqwest::Client::new(), &[source(&server.uri())]);

        let err = fetcher
            .fetch(&page("quiet", Some("/quiet"), false), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, PreviewError::EmptyResultSet(_)));
    }

    #[tokio::test]
    async fn unknown_newspaper_is_not_configured() {
        let fetcher = HttpPreviewFetcher::new(reqwest::Client::new(), &[]);

        let err = fetcher
            .fetch(&page("front", Some("/front"), false), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, PreviewError::SourceNotConfigured(_)));
    }

    #[tokio::test]
    async fn paginated_template_without_placeholder_fails_link_build() {
        let fetcher =
            HttpPreviewFetcher::new(reqwest::Client::new(), &[source("http://localhost:1")]);

        let err = fetcher
            .fetch(&page("archive", Some("/archive"), true), 1)
            .await
            .unwrap_err();

        assert!(matches!(err, PreviewError::LinkBuildFailed(_)));
    }
}
