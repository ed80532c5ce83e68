pub mod body;
pub mod preview;

pub use body::HttpBodyFetcher;
pub use preview::HttpPreviewFetcher;

use async_trait::async_trait;

use crate::crawler::error::{BodyError, PreviewError};
use crate::crawler::model::{Article, Page};

/// Fetches candidate articles from one preview page of a newspaper section.
#[async_trait]
pub trait PreviewFetcher: Send + Sync {
    async fn fetch(&self, page: &Page, page_number: i32) -> Result<Vec<Article>, PreviewError>;
}

/// Fills in and returns the full body of an article stub.
#[async_trait]
pub trait BodyFetcher: Send + Sync {
    async fn fetch(&self, article: &Article) -> Result<Article, BodyError>;
}
