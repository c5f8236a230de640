//! Timeline Builder
//!
//! Stitches per-verse caption files into one timeline per language. Verses
//! whose captions cannot be loaded contribute zero segments; building never
//! fails.

use std::sync::Arc;

use tracing::debug;

use super::{Timeline, Timelines};
use crate::core::captions::{CaptionLoader, Segment};
use crate::core::resources::ResourcePaths;
use crate::core::{Language, VerseNumber};

/// Builds timelines from the captions of a lesson
#[derive(Clone)]
pub struct TimelineBuilder {
    loader: Arc<CaptionLoader>,
}

impl TimelineBuilder {
    pub fn new(loader: Arc<CaptionLoader>) -> Self {
        Self { loader }
    }

    async fn verse_segments(
        &self,
        paths: &ResourcePaths,
        language: Language,
        verse: VerseNumber,
    ) -> Vec<Segment> {
        self.loader
            .load_or_empty(&paths.caption(verse, language), verse)
            .await
    }

    /// Concatenates every verse of `verses`, in ascending order, starting at index 0
    pub async fn build(&self, lesson: &str, language: Language, verses: &[VerseNumber]) -> Timeline {
        let paths = ResourcePaths::new(lesson);
        let mut ordered = verses.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut timeline = Timeline::new(language, 0);
        for verse in ordered {
            let segments = self.verse_segments(&paths, language, verse).await;
            timeline.push_verse(verse, segments);
        }

        debug!(
            lesson,
            language = %language,
            segments = timeline.len(),
            "Built timeline"
        );
        timeline
    }

    /// Number of segments in the verses of `verses` strictly before `verse`
    pub async fn offset_before(
        &self,
        lesson: &str,
        language: Language,
        verse: VerseNumber,
        verses: &[VerseNumber],
    ) -> usize {
        let paths = ResourcePaths::new(lesson);
        let mut offset = 0;
        for &earlier in verses.iter().filter(|&&v| v < verse) {
            offset += self.verse_segments(&paths, language, earlier).await.len();
        }
        offset
    }

    /// A single verse, indexed as it would be in the full timeline
    pub async fn build_verse(
        &self,
        lesson: &str,
        language: Language,
        verse: VerseNumber,
        verses: &[VerseNumber],
    ) -> Timeline {
        let base = self.offset_before(lesson, language, verse, verses).await;
        let paths = ResourcePaths::new(lesson);

        let mut timeline = Timeline::new(language, base);
        let segments = self.verse_segments(&paths, language, verse).await;
        timeline.push_verse(verse, segments);
        timeline
    }

    /// Both languages over all of `verses`, Portuguese aligned to English
    pub async fn build_pair(&self, lesson: &str, verses: &[VerseNumber]) -> Timelines {
        let (english, portuguese) = tokio::join!(
            self.build(lesson, Language::English, verses),
            self.build(lesson, Language::Portuguese, verses),
        );
        let mut timelines = Timelines {
            english,
            portuguese,
        };
        timelines.align();
        timelines
    }

    /// Both languages for one verse, Portuguese aligned to English
    pub async fn build_verse_pair(
        &self,
        lesson: &str,
        verse: VerseNumber,
        verses: &[VerseNumber],
    ) -> Timelines {
        let (english, portuguese) = tokio::join!(
            self.build_verse(lesson, Language::English, verse, verses),
            self.build_verse(lesson, Language::Portuguese, verse, verses),
        );
        let mut timelines = Timelines {
            english,
            portuguese,
        };
        timelines.align();
        timelines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resources::{MemoryCache, MemoryFetcher};
    use std::time::Duration;

    fn caption(count: usize, marker_text: &str) -> String {
        (0..count)
            .map(|i| {
                let marker = if i == 0 { "*" } else { "" };
                format!(
                    "{}\n00:00:0{},000 --> 00:00:0{},000\n{}{} {}\n",
                    i + 1,
                    i,
                    i + 1,
                    marker,
                    marker_text,
                    i
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn builder_with(verses: &[(VerseNumber, usize, usize)]) -> (TimelineBuilder, Arc<MemoryFetcher>) {
        let fetcher = Arc::new(MemoryFetcher::new());
        let paths = ResourcePaths::new("1");
        for &(verse, en, pt) in verses {
            fetcher.insert(&paths.caption(verse, Language::English), &caption(en, "en"));
            fetcher.insert(&paths.caption(verse, Language::Portuguese), &caption(pt, "pt"));
        }
        let loader = CaptionLoader::new(
            fetcher.clone(),
            Arc::new(MemoryCache::new()),
            Duration::from_millis(1500),
        );
        (TimelineBuilder::new(Arc::new(loader)), fetcher)
    }

    #[tokio::test]
    async fn test_build_concatenates_in_verse_order() {
        let (builder, _) = builder_with(&[(1, 3, 3), (2, 2, 2)]);

        let timeline = builder.build("1", Language::English, &[2, 1]).await;
        assert_eq!(timeline.len(), 5);
        assert_eq!(timeline.base_index, 0);
        assert_eq!(timeline.get(0).and_then(|s| s.verse_number), Some(1));
        assert_eq!(timeline.get(3).and_then(|s| s.verse_number), Some(2));
        assert_eq!(timeline.span_for(2).map(|s| s.start_index), Some(3));
    }

    #[tokio::test]
    async fn test_missing_verse_contributes_nothing() {
        let (builder, _) = builder_with(&[(1, 2, 2), (3, 1, 1)]);

        let timeline = builder.build("1", Language::Portuguese, &[1, 2, 3]).await;
        assert_eq!(timeline.len(), 3);
        assert!(timeline.span_for(2).is_some_and(|s| s.is_empty()));
    }

    #[tokio::test]
    async fn test_offset_before() {
        let (builder, _) = builder_with(&[(1, 3, 3), (2, 4, 4), (3, 2, 2)]);
        let verses = [1, 2, 3];

        assert_eq!(builder.offset_before("1", Language::English, 1, &verses).await, 0);
        assert_eq!(builder.offset_before("1", Language::English, 3, &verses).await, 7);
    }

    #[tokio::test]
    async fn test_build_verse_uses_offset_as_base() {
        let (builder, _) = builder_with(&[(1, 3, 3), (2, 2, 2)]);

        let timeline = builder.build_verse("1", Language::English, 2, &[1, 2]).await;
        assert_eq!(timeline.base_index, 3);
        assert_eq!(timeline.indices(), 3..5);
        assert_eq!(timeline.get(3).and_then(|s| s.verse_number), Some(2));
    }

    #[tokio::test]
    async fn test_build_pair_aligns_portuguese() {
        let (builder, fetcher) = builder_with(&[(1, 2, 0)]);
        fetcher.insert(
            &ResourcePaths::new("1").caption(1, Language::Portuguese),
            "1\n00:00:00,200 --> 00:00:00,900\n*pt a\n\n2\n00:00:00,900 --> 00:00:02,500\npt b\n",
        );

        let pair = builder.build_pair("1", &[1]).await;
        assert_eq!(pair.english.len(), 2);
        assert_eq!(pair.portuguese.len(), 2);
        assert_eq!(pair.portuguese.segments()[0].start, 0.0);
        assert_eq!(pair.portuguese.segments()[1].end, 2.0);
        assert_eq!(pair.portuguese.segments()[1].main_text, "pt b");
    }

    #[tokio::test]
    async fn test_captions_fetched_once_across_builds() {
        let (builder, fetcher) = builder_with(&[(1, 2, 2), (2, 2, 2)]);

        builder.build_verse_pair("1", 2, &[1, 2]).await;
        builder.build_pair("1", &[1, 2]).await;

        let mut requests = fetcher.requests();
        requests.sort();
        requests.dedup();
        assert_eq!(requests.len(), fetcher.requests().len());
    }
}
