//! Caption Loader
//!
//! Fetches caption resources with a bounded wait and keeps their raw text in
//! two cache tiers: an in-process map and the persistent key/value cache
//! (key `srt_{url}`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{parse_captions, Segment};
use crate::core::resources::{fetch_with_timeout, KeyValueCache, ResourceFetcher};
use crate::core::{CoreResult, VerseNumber};

/// Prefix of persistent cache keys holding raw caption text
pub const CAPTION_CACHE_PREFIX: &str = "srt_";

/// Loads and parses caption resources
pub struct CaptionLoader {
    fetcher: Arc<dyn ResourceFetcher>,
    cache: Arc<dyn KeyValueCache>,
    memory: RwLock<HashMap<String, String>>,
    timeout: Duration,
}

impl CaptionLoader {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        cache: Arc<dyn KeyValueCache>,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            cache,
            memory: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    pub fn cache_key(url: &str) -> String {
        format!("{}{}", CAPTION_CACHE_PREFIX, url)
    }

    /// Returns the raw caption text of `url`
    pub async fn fetch_text(&self, url: &str) -> CoreResult<String> {
        if let Some(text) = self.memory.read().await.get(url) {
            return Ok(text.clone());
        }

        let key = Self::cache_key(url);
        if let Some(text) = self.cache.get(&key).await {
            debug!(url, "Caption served from persistent cache");
            self.memory
                .write()
                .await
                .insert(url.to_string(), text.clone());
            return Ok(text);
        }

        let text = fetch_with_timeout(self.fetcher.as_ref(), url, self.timeout).await?;
        self.memory
            .write()
            .await
            .insert(url.to_string(), text.clone());
        self.cache.set(&key, &text).await;

        Ok(text)
    }

    /// Fetches and parses `url`, numbering verse markers from `verse_hint`
    pub async fn load(&self, url: &str, verse_hint: VerseNumber) -> CoreResult<Vec<Segment>> {
        let text = self.fetch_text(url).await?;
        Ok(parse_captions(&text, verse_hint))
    }

    /// Like [`load`](Self::load), but an unavailable resource yields no segments
    pub async fn load_or_empty(&self, url: &str, verse_hint: VerseNumber) -> Vec<Segment> {
        match self.load(url, verse_hint).await {
            Ok(segments) => segments,
            Err(e) => {
                warn!(url, error = %e, "Caption unavailable, treating verse as empty");
                Vec::new()
            }
        }
    }

    /// Drops the in-process copies; the persistent cache is kept
    pub async fn clear_memory(&self) {
        self.memory.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resources::{MemoryCache, MemoryFetcher};
    use crate::core::CoreError;

    const VERSE: &str = "1\n00:00:00,000 --> 00:00:01,000\n*First {Primeiro}\n\n2\n00:00:01,000 --> 00:00:02,000\nSecond\n";

    fn loader(fetcher: Arc<MemoryFetcher>, cache: Arc<MemoryCache>) -> CaptionLoader {
        CaptionLoader::new(fetcher, cache, Duration::from_millis(1500))
    }

    #[tokio::test]
    async fn test_load_parses_and_caches() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("a.srt", VERSE);
        let cache = Arc::new(MemoryCache::new());
        let loader = loader(fetcher.clone(), cache.clone());

        let segments = loader.load("a.srt", 4).await.unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].verse_number, Some(4));
        assert_eq!(segments[0].translation, "Primeiro");

        loader.load("a.srt", 4).await.unwrap();
        assert_eq!(fetcher.requests(), vec!["a.srt"]);
        assert_eq!(cache.get("srt_a.srt").await.as_deref(), Some(VERSE));
    }

    #[tokio::test]
    async fn test_persistent_cache_is_consulted_first() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let cache = Arc::new(MemoryCache::new());
        cache.set("srt_a.srt", VERSE).await;

        let loader = loader(fetcher.clone(), cache);
        assert_eq!(loader.load("a.srt", 1).await.unwrap().len(), 2);
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_clear_memory_falls_back_to_persistent_cache() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("a.srt", VERSE);
        let cache = Arc::new(MemoryCache::new());
        let loader = loader(fetcher.clone(), cache.clone());

        loader.load("a.srt", 1).await.unwrap();
        loader.clear_memory().await;
        fetcher.remove("a.srt");

        assert_eq!(loader.load("a.srt", 1).await.unwrap().len(), 2);
        assert_eq!(fetcher.requests(), vec!["a.srt"]);
    }

    #[tokio::test]
    async fn test_missing_caption_is_unavailable() {
        let loader = loader(Arc::new(MemoryFetcher::new()), Arc::new(MemoryCache::new()));

        let err = loader.load("missing.srt", 1).await.unwrap_err();
        assert!(matches!(err, CoreError::ResourceUnavailable { .. }));
        assert!(loader.load_or_empty("missing.srt", 1).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_caption_times_out() {
        let fetcher = Arc::new(MemoryFetcher::new().with_latency(Duration::from_secs(3)));
        fetcher.insert("slow.srt", VERSE);
        let cache = Arc::new(MemoryCache::new());
        let loader = loader(fetcher, cache.clone());

        assert!(loader.load_or_empty("slow.srt", 1).await.is_empty());
        assert!(cache.is_empty().await);
    }
}
