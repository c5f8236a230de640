//! HTTP resource fetcher
//!
//! Fetches lesson resources from the published site. Relative URLs are joined
//! onto the configured base URL.

use async_trait::async_trait;
use tracing::debug;

use super::ResourceFetcher;
use crate::core::{CoreError, CoreResult};

/// Fetcher backed by a shared `reqwest` client
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    base_url: String,
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher for `base_url` (e.g. `https://example.org/psalms`)
    pub fn new(base_url: &str) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn absolute(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        }
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> CoreResult<String> {
        let response = self
            .client
            .get(self.absolute(url))
            .send()
            .await
            .map_err(|e| CoreError::unavailable(url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::unavailable(
                url,
                format!("HTTP {}", response.status()),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| CoreError::unavailable(url, format!("Failed to read body: {}", e)))
    }

    async fn exists(&self, url: &str) -> bool {
        match self.client.head(self.absolute(url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url, error = %e, "Probe request failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_url_joining() {
        let fetcher = HttpFetcher::new("https://example.org/psalms/").unwrap();
        assert_eq!(fetcher.base_url(), "https://example.org/psalms");
        assert_eq!(
            fetcher.absolute("psalm-config.json"),
            "https://example.org/psalms/psalm-config.json"
        );
        assert_eq!(
            fetcher.absolute("/subtitles/psalm_1/v.1_psalm_1_en.srt"),
            "https://example.org/psalms/subtitles/psalm_1/v.1_psalm_1_en.srt"
        );
        assert_eq!(
            fetcher.absolute("https://cdn.example.org/a.mp3"),
            "https://cdn.example.org/a.mp3"
        );
    }
}
