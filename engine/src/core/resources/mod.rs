//! Lesson Resources
//!
//! Everything the engine reads from the outside world goes through the
//! [`ResourceFetcher`] seam:
//! - caption files and the verse-count configuration (`fetch_text`)
//! - silent existence probes for captions and audio (`exists`)
//!
//! Fetchers never surface missing resources as hard failures; callers bound
//! every call with a timeout and treat timeouts as "absent".

mod cache;
mod directory;
#[cfg(feature = "http")]
mod http;
mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::core::{CoreError, CoreResult, Language, LessonId, SegmentIndex, VerseNumber};

pub use cache::{JsonFileCache, KeyValueCache, MemoryCache};
pub use directory::DirectoryFetcher;
#[cfg(feature = "http")]
pub use http::HttpFetcher;
pub use memory::MemoryFetcher;

// =============================================================================
// Fetcher Trait
// =============================================================================

/// Source of lesson resources addressed by relative URL
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetches a text resource. Missing resources and non-success statuses
    /// are reported as [`CoreError::ResourceUnavailable`].
    async fn fetch_text(&self, url: &str) -> CoreResult<String>;

    /// Checks whether a resource exists without logging failures
    async fn exists(&self, url: &str) -> bool;
}

/// Fetches text, treating a slow fetcher as an absent resource
pub async fn fetch_with_timeout(
    fetcher: &dyn ResourceFetcher,
    url: &str,
    timeout: Duration,
) -> CoreResult<String> {
    match tokio::time::timeout(timeout, fetcher.fetch_text(url)).await {
        Ok(result) => result,
        Err(_) => Err(CoreError::ResourceTimeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Probes a resource; a probe that does not answer in time counts as missing
pub async fn exists_within(fetcher: &dyn ResourceFetcher, url: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, fetcher.exists(url)).await {
        Ok(found) => found,
        Err(_) => {
            debug!(url, "Existence probe timed out");
            false
        }
    }
}

// =============================================================================
// Resource Paths
// =============================================================================

/// Name of the lesson -> verse count configuration resource
pub const VERSE_CONFIG_FILE: &str = "psalm-config.json";

/// Builds resource URLs for one lesson
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourcePaths {
    lesson: LessonId,
}

impl ResourcePaths {
    pub fn new(lesson: &str) -> Self {
        Self {
            lesson: lesson.to_string(),
        }
    }

    pub fn lesson(&self) -> &str {
        &self.lesson
    }

    /// Caption file of one verse: `subtitles/psalm_{id}/v.{n}_psalm_{id}_{lang}.srt`
    pub fn caption(&self, verse: VerseNumber, language: Language) -> String {
        format!(
            "subtitles/psalm_{id}/v.{verse}_psalm_{id}_{lang}.srt",
            id = self.lesson,
            lang = language.code()
        )
    }

    /// Verse audio without extension: `audios/psalm_{id}/v.{n}_psalm_{id}_{lang}`
    pub fn verse_audio_base(&self, verse: VerseNumber, language: Language) -> String {
        format!(
            "audios/psalm_{id}/v.{verse}_psalm_{id}_{lang}",
            id = self.lesson,
            lang = language.code()
        )
    }

    /// Per-segment audio: `audios/psalm_{id}/verses/{index+1}_{lang}.mp3`
    pub fn segment_audio(&self, index: SegmentIndex, language: Language) -> String {
        format!(
            "audios/psalm_{id}/verses/{n}_{lang}.mp3",
            id = self.lesson,
            n = index + 1,
            lang = language.code()
        )
    }
}

// =============================================================================
// Audio Resolution
// =============================================================================

/// Resolves an extensionless audio base path to a playable URL
#[derive(Clone)]
pub struct AudioResolver {
    fetcher: Arc<dyn ResourceFetcher>,
    extensions: Vec<String>,
    timeout: Duration,
}

impl AudioResolver {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, extensions: Vec<String>, timeout: Duration) -> Self {
        Self {
            fetcher,
            extensions,
            timeout,
        }
    }

    /// Returns the first `{base}.{ext}` that exists, or `None`
    pub async fn resolve(&self, base: &str) -> Option<String> {
        for ext in &self.extensions {
            let candidate = format!("{}.{}", base, ext);
            if exists_within(self.fetcher.as_ref(), &candidate, self.timeout).await {
                return Some(candidate);
            }
        }
        debug!(base, "No playable audio found");
        None
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_paths() {
        let paths = ResourcePaths::new("23");
        assert_eq!(
            paths.caption(2, Language::English),
            "subtitles/psalm_23/v.2_psalm_23_en.srt"
        );
        assert_eq!(
            paths.verse_audio_base(1, Language::Portuguese),
            "audios/psalm_23/v.1_psalm_23_pt"
        );
        assert_eq!(
            paths.segment_audio(0, Language::Portuguese),
            "audios/psalm_23/verses/1_pt.mp3"
        );
    }

    #[tokio::test]
    async fn test_audio_resolver_picks_existing_extension() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("audios/psalm_1/v.1_psalm_1_en.m4a", "");
        let resolver = AudioResolver::new(
            fetcher.clone(),
            vec!["mp3".to_string(), "m4a".to_string()],
            Duration::from_millis(500),
        );

        assert_eq!(
            resolver.resolve("audios/psalm_1/v.1_psalm_1_en").await,
            Some("audios/psalm_1/v.1_psalm_1_en.m4a".to_string())
        );
        assert_eq!(resolver.resolve("audios/psalm_1/v.2_psalm_1_en").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_is_absent() {
        let fetcher = MemoryFetcher::new().with_latency(Duration::from_secs(5));
        fetcher.insert("slow.srt", "content");

        let err = fetch_with_timeout(&fetcher, "slow.srt", Duration::from_millis(1500))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ResourceTimeout { timeout_ms: 1500, .. }));
        assert!(err.is_absent());
        assert!(!exists_within(&fetcher, "slow.srt", Duration::from_millis(300)).await);
    }
}
