use anyhow::anyhow;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashMap;
use tracing::debug;

use crate::cli::config::SourceConfig;
use crate::crawler::error::BodyError;
use crate::crawler::model::Article;
use crate::fetch::preview::SourceProfile;
use crate::fetch::BodyFetcher;

/// HTTP article-body fetcher driven by per-newspaper selector profiles.
///
/// An article only knows the page it was discovered on, so profiles are
/// keyed by page id here.
pub struct HttpBodyFetcher {
    client: reqwest::Client,
    profiles: HashMap<String, SourceProfile>,
}

impl HttpBodyFetcher {
    pub fn new(client: reqwest::Client, sources: &[SourceConfig]) -> Self {
        let mut profiles = HashMap::new();

        for source in sources {
            let profile = SourceProfile {
                base_url: source.base_url.clone(),
                selectors: source.selectors.clone(),
            };
            for page in &source.pages {
                profiles.insert(page.id.clone(), profile.clone());
            }
        }

        Self { client, profiles }
    }
}

#[async_trait]
impl BodyFetcher for HttpBodyFetcher {
    async fn fetch(&self, article: &Article) -> Result<Article, BodyError> {
        if article.link.trim().is_empty() {
            return Err(BodyError::MissingLink(article.id.clone()));
        }

        let profile = self.profiles.get(&article.page_id).ok_or_else(|| {
            BodyError::Unclassified(anyhow!(
                "no source configured for page '{}'",
                article.page_id
            ))
        })?;

        debug!("Fetching article body from {}", article.link);

        let response = self
            .client
            .get(&article.link)
            .send()
            .await
            .map_err(|e| BodyError::Unclassified(anyhow!(e).context("article request failed")))?;

        if !response.status().is_success() {
            return Err(BodyError::Unclassified(anyhow!(
                "article request to {} returned {}",
                article.link,
                response.status()
            )));
        }

        let document = response
            .text()
            .await
            .map_err(|e| BodyError::Unclassified(anyhow!(e).context("article body unreadable")))?;

        if document.trim().is_empty() {
            return Err(BodyError::MalformedDocument(article.link.clone()));
        }

        let body = parse_article_body(&document, &profile.selectors.article_body)?;

        if body.is_empty() {
            return Err(BodyError::EmptyBody(article.link.clone()));
        }

        let mut fetched = article.clone();
        fetched.body = Some(body);
        fetched.downloaded = true;
        Ok(fetched)
    }
}

/// Extract the body paragraphs from an article document.
///
/// Synchronous so the parsed DOM never lives across an await point.
fn parse_article_body(document: &str, body_selector: &str) -> Result<String, BodyError> {
    let selector = Selector::parse(body_selector)
        .map_err(|_| BodyError::Unclassified(anyhow!("invalid body selector '{}'", body_selector)))?;

    let html = Html::parse_document(document);

    let paragraphs: Vec<String> = html
        .select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|paragraph| !paragraph.is_empty())
        .collect();

    Ok(paragraphs.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::{PageSettings, SelectorSettings};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source(base_url: &str) -> SourceConfig {
        SourceConfig {
            id: "np".to_string(),
            name: "Test Paper".to_string(),
            base_url: base_url.to_string(),
            selectors: SelectorSettings {
                preview_block: "div.story-card".to_string(),
                article_link: "a".to_string(),
                link_attr: "href".to_string(),
                article_title: "h2".to_string(),
                preview_image: None,
                publication_date: None,
                article_body: "div.article-content p".to_string(),
            },
            pages: vec![PageSettings {
                id: "front".to_string(),
                name: "Front Page".to_string(),
                parent_page_id: None,
                link_format: Some("/".to_string()),
                paginated: false,
                active: true,
            }],
        }
    }

    fn stub(link: &str) -> Article {
        Article {
            id: link.to_string(),
            page_id: "front".to_string(),
            link: link.to_string(),
            title: "A Story".to_string(),
            preview: json!({}),
            body: None,
            downloaded: false,
        }
    }

    #[tokio::test]
    async fn fills_in_the_body_and_marks_downloaded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news/a-story"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><div class="article-content">
                     <p>First paragraph.</p>
                     <p>Second paragraph.</p>
                   </div></body></html>"#,
            ))
            .mount(&server)
            .await;

        let fetcher = HttpBodyFetcher::new(reqwest::Client::new(), &[source(&server.uri())]);

        let fetched = fetcher
            .fetch(&stub(&format!("{}/news/a-story", server.uri())))
            .await
            .unwrap();

        assert!(fetched.downloaded);
        assert_eq!(
            fetched.body.as_deref(),
            Some("First paragraph.\n\nSecond paragraph.")
        );
    }

    #[tokio::test]
    async fn article_without_body_text_is_an_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news/hollow"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><div class="article-content"></div></body></html>"#,
            ))
            .mount(&server)
            .await;

        let fetcher = HttpBodyFetcher::new(reqwest::Client::new(), &[source(&server.uri())]);

        let err = fetcher
            .fetch(&stub(&format!("{}/news/hollow", server.uri())))
            .await
            .unwrap_err();

        assert!(matches!(err, BodyError::EmptyBody(_)));
    }

    #[tokio::test]
    async fn blank_link_is_a_missing_link() {
        let fetcher = HttpBodyFetcher::new(reqwest::Client::new(), &[source("http://localhost:1")]);

        let err = fetcher.fetch(&stub("")).await.unwrap_err();

        assert!(matches!(err, BodyError::MissingLink(_)));
    }
}
