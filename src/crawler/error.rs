use thiserror::Error;

/// Failures raised while fetching and parsing a preview page.
///
/// The set is closed on purpose: the crawl loop dispatches on these kinds
/// with a total match instead of a catch hierarchy.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("no source configured for newspaper '{0}'")]
    SourceNotConfigured(String),

    #[error("no preview parser available for newspaper '{0}'")]
    ParserUnavailable(String),

    #[error("could not build preview link for page '{0}'")]
    LinkBuildFailed(String),

    #[error("malformed preview document at {0}")]
    MalformedDocument(String),

    #[error("preview page at {0} yielded no articles")]
    EmptyResultSet(String),

    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),
}

impl PreviewError {
    /// A successful-but-empty fetch still advances the pagination cursor;
    /// every other failure leaves the cursor untouched.
    pub fn advances_cursor(&self) -> bool {
        matches!(self, PreviewError::EmptyResultSet(_))
    }
}

/// Failures raised while fetching and parsing an article body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("article '{0}' has no link")]
    MissingLink(String),

    #[error("malformed article document at {0}")]
    MalformedDocument(String),

    #[error("empty article body at {0}")]
    EmptyBody(String),

    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),
}

impl BodyError {
    /// Permanent failures delete the article record; anything unclassified
    /// leaves it in place for the backlog drain to retry later.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, BodyError::Unclassified(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_empty_result_advances_cursor() {
        assert!(PreviewError::EmptyResultSet("http://x".into()).advances_cursor());
        assert!(!PreviewError::MalformedDocument("http://x".into()).advances_cursor());
        assert!(!PreviewError::LinkBuildFailed("p1".into()).advances_cursor());
        assert!(!PreviewError::Unclassified(anyhow::anyhow!("timeout")).advances_cursor());
    }

    #[test]
    fn permanent_body_failures_are_classified() {
        assert!(BodyError::MissingLink("a1".into()).is_permanent());
        assert!(BodyError::MalformedDocument("http://x".into()).is_permanent());
        assert!(BodyError::EmptyBody("http://x".into()).is_permanent());
        assert!(!BodyError::Unclassified(anyhow::anyhow!("timeout")).is_permanent());
    }
}
