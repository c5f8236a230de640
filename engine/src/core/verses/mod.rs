//! Verse Discovery
//!
//! Determines which verses of a lesson have resources.
//!
//! The verse-count configuration (`{ "<lessonId>": <count> }`) is the fast
//! path. Without a usable entry, verses are probed in order until the first
//! one missing a caption in either language. Results are cached per lesson
//! until invalidated.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::resources::{exists_within, fetch_with_timeout, ResourcePaths, ResourceFetcher};
use crate::core::settings::ReaderSettings;
use crate::core::{CoreError, CoreResult, Language, LessonId, VerseNumber};

/// Verses reported when probing finds nothing. Kept for compatibility with
/// the published lessons, which always had at least two verse slots.
pub const PROBE_FALLBACK_VERSES: [VerseNumber; 2] = [1, 2];

/// Discovers and caches verse sets per lesson
pub struct VerseDiscovery {
    fetcher: Arc<dyn ResourceFetcher>,
    config_file: String,
    config_timeout: Duration,
    probe_timeout: Duration,
    probe_cap: VerseNumber,
    cache: HashMap<LessonId, Vec<VerseNumber>>,
}

impl VerseDiscovery {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, settings: &ReaderSettings) -> Self {
        Self {
            fetcher,
            config_file: settings.verse_config_file.clone(),
            config_timeout: settings.caption_timeout(),
            probe_timeout: settings.probe_timeout(),
            probe_cap: settings.probe_cap,
            cache: HashMap::new(),
        }
    }

    /// Returns the ascending verse set of `lesson`, cached until invalidated
    pub async fn discover(&mut self, lesson: &str) -> Vec<VerseNumber> {
        if let Some(verses) = self.cache.get(lesson) {
            return verses.clone();
        }

        let verses = match self.configured_count(lesson).await {
            Ok(count) => {
                debug!(lesson, count, "Verse count from configuration");
                (1..=count).collect()
            }
            Err(e) => {
                debug!(lesson, "No usable verse configuration ({}), probing", e);
                self.probe(lesson).await
            }
        };

        info!(lesson, verses = verses.len(), "Discovered verses");
        self.cache.insert(lesson.to_string(), verses.clone());
        verses
    }

    /// Whether the lesson may have content. Only an explicit count of `0`
    /// in the configuration rules it out; nothing is probed.
    pub async fn has_content(&self, lesson: &str) -> bool {
        !matches!(self.configured_count(lesson).await, Ok(0))
    }

    /// Cached verse set, if discovery already ran
    pub fn cached(&self, lesson: &str) -> Option<&[VerseNumber]> {
        self.cache.get(lesson).map(Vec::as_slice)
    }

    pub fn invalidate(&mut self, lesson: &str) {
        if self.cache.remove(lesson).is_some() {
            debug!(lesson, "Verse cache invalidated");
        }
    }

    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Reads the verse count of `lesson` from the configuration resource.
    ///
    /// Any reason the count cannot be used (fetch failure, invalid JSON,
    /// missing key, non-integer value) is `ConfigurationMissing`.
    pub async fn configured_count(&self, lesson: &str) -> CoreResult<VerseNumber> {
        let text = fetch_with_timeout(self.fetcher.as_ref(), &self.config_file, self.config_timeout)
            .await
            .map_err(|e| CoreError::ConfigurationMissing(e.to_string()))?;

        let config: HashMap<String, Value> = serde_json::from_str(&text).map_err(|e| {
            warn!("Verse configuration is not valid JSON: {}", e);
            CoreError::ConfigurationMissing(format!("{}: {}", self.config_file, e))
        })?;

        let value = config.get(lesson).ok_or_else(|| {
            CoreError::ConfigurationMissing(format!("no entry for lesson {}", lesson))
        })?;

        let count = value
            .as_u64()
            .and_then(|n| VerseNumber::try_from(n).ok())
            .ok_or_else(|| {
                CoreError::ConfigurationMissing(format!(
                    "entry for lesson {} is not a verse count: {}",
                    lesson, value
                ))
            })?;

        if count > self.probe_cap {
            warn!(lesson, count, cap = self.probe_cap, "Configured verse count exceeds cap");
            return Err(CoreError::ConfigurationMissing(format!(
                "entry for lesson {} exceeds {} verses: {}",
                lesson, self.probe_cap, count
            )));
        }
        Ok(count)
    }

    /// Probes verses in order, both languages concurrently, until one is missing
    async fn probe(&self, lesson: &str) -> Vec<VerseNumber> {
        let paths = ResourcePaths::new(lesson);
        let mut verses = Vec::new();

        for verse in 1..=self.probe_cap {
            let english = paths.caption(verse, Language::English);
            let portuguese = paths.caption(verse, Language::Portuguese);
            let (has_english, has_portuguese) = tokio::join!(
                exists_within(self.fetcher.as_ref(), &english, self.probe_timeout),
                exists_within(self.fetcher.as_ref(), &portuguese, self.probe_timeout),
            );

            if !(has_english && has_portuguese) {
                debug!(lesson, verse, has_english, has_portuguese, "Probing stopped");
                break;
            }
            verses.push(verse);
        }

        if verses.is_empty() {
            warn!(lesson, "Probing found no verses, reporting fallback set");
            return PROBE_FALLBACK_VERSES.to_vec();
        }
        verses
    }
}
