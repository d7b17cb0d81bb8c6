//! Content-fetch contract and an offline page map.

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::errors::StepError;

/// Retrieves the textual content behind a URL or resource id.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, StepError>;
}

/// Serves pre-registered pages; unknown URLs fail like a dead link.
#[derive(Debug, Default)]
pub struct MockFetcher {
    pages: FxHashMap<String, String>,
}

impl MockFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }
}

#[async_trait]
impl ContentFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, StepError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| StepError::Provider {
                provider: "mock-fetcher",
                message: format!("no page registered for '{url}'"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registered_pages_resolve() {
        let fetcher = MockFetcher::new().with_page("doc://a", "alpha");
        assert_eq!(fetcher.fetch("doc://a").await.unwrap(), "alpha");
        assert!(fetcher.fetch("doc://missing").await.is_err());
    }
}
