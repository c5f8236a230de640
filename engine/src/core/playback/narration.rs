//! Narration Plans
//!
//! Pure descriptions of what each narration mode plays next. The controller
//! asks a plan for the following step whenever a clip ends (or fails), which
//! keeps sequencing out of callback chains and makes cancellation a matter of
//! dropping the plan.

use tracing::debug;

use crate::core::resources::{AudioResolver, ResourcePaths};
use crate::core::timeline::{Timeline, Timelines, VerseSpan};
use crate::core::{Language, SegmentIndex, VerseNumber};

// =============================================================================
// Single Track
// =============================================================================

/// One verse audio clip and the segments it narrates
#[derive(Clone, Debug, PartialEq)]
pub struct VerseClip {
    pub verse: VerseNumber,
    pub url: String,
    pub span: VerseSpan,
}

/// Verse clips of the English track, played in order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SingleTrackPlan {
    clips: Vec<VerseClip>,
    position: usize,
}

impl SingleTrackPlan {
    pub fn new(clips: Vec<VerseClip>) -> Self {
        Self { clips, position: 0 }
    }

    /// Plans every verse of `english` that has captions and resolvable audio
    pub async fn resolve(
        resolver: &AudioResolver,
        paths: &ResourcePaths,
        english: &Timeline,
    ) -> Self {
        let mut clips = Vec::new();
        for span in english.spans() {
            if span.is_empty() {
                debug!(verse = span.verse, "Verse has no captions, not narrated");
                continue;
            }
            let base = paths.verse_audio_base(span.verse, Language::English);
            match resolver.resolve(&base).await {
                Some(url) => clips.push(VerseClip {
                    verse: span.verse,
                    url,
                    span: *span,
                }),
                None => debug!(verse = span.verse, "Verse has no audio, not narrated"),
            }
        }
        Self::new(clips)
    }

    pub fn clips(&self) -> &[VerseClip] {
        &self.clips
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn current(&self) -> Option<&VerseClip> {
        self.clips.get(self.position)
    }

    /// Moves to the next clip; `None` once the plan is exhausted
    pub fn advance(&mut self) -> Option<&VerseClip> {
        if self.position < self.clips.len() {
            self.position += 1;
        }
        self.current()
    }

    /// Segment left highlighted after the last clip
    pub fn final_index(&self) -> Option<SegmentIndex> {
        self.clips
            .last()
            .filter(|clip| !clip.span.is_empty())
            .map(|clip| clip.span.end_index() - 1)
    }
}

// =============================================================================
// Alternate
// =============================================================================

/// One clip of alternate narration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlternateStep {
    /// Position within the timeline (0-based)
    pub position: usize,
    /// Absolute segment index
    pub index: SegmentIndex,
    pub language: Language,
}

/// Per-segment clips, `first` language then the other, segment by segment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlternatePlan {
    first: Language,
    base_index: SegmentIndex,
    english_len: usize,
    portuguese_len: usize,
}

impl AlternatePlan {
    pub fn new(timelines: &Timelines, first: Language) -> Self {
        let base_index = if timelines.english.is_empty() {
            timelines.portuguese.base_index
        } else {
            timelines.english.base_index
        };
        Self {
            first,
            base_index,
            english_len: timelines.english.len(),
            portuguese_len: timelines.portuguese.len(),
        }
    }

    pub fn first_language(&self) -> Language {
        self.first
    }

    pub fn base_index(&self) -> SegmentIndex {
        self.base_index
    }

    /// Number of segment positions; the longer track decides
    pub fn total(&self) -> usize {
        self.english_len.max(self.portuguese_len)
    }

    fn has(&self, language: Language, position: usize) -> bool {
        match language {
            Language::English => position < self.english_len,
            Language::Portuguese => position < self.portuguese_len,
        }
    }

    fn ordinal(&self, step: &AlternateStep) -> usize {
        step.position * 2 + usize::from(step.language != self.first)
    }

    /// First playable step at or after `ordinal`; languages without a segment
    /// at a position are skipped
    fn step_from(&self, ordinal: usize) -> Option<AlternateStep> {
        (ordinal..self.total() * 2).find_map(|o| {
            let position = o / 2;
            let language = if o % 2 == 0 {
                self.first
            } else {
                self.first.other()
            };
            self.has(language, position).then_some(AlternateStep {
                position,
                index: self.base_index + position,
                language,
            })
        })
    }

    pub fn first_step(&self) -> Option<AlternateStep> {
        self.step_from(0)
    }

    pub fn next_step(&self, current: &AlternateStep) -> Option<AlternateStep> {
        self.step_from(self.ordinal(current) + 1)
    }

    /// Every step in playing order
    pub fn steps(&self) -> Vec<AlternateStep> {
        std::iter::successors(self.first_step(), |step| self.next_step(step)).collect()
    }

    pub fn url(&self, paths: &ResourcePaths, step: &AlternateStep) -> String {
        paths.segment_audio(step.index, step.language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::captions::Segment;
    use crate::core::resources::MemoryFetcher;
    use std::sync::Arc;
    use std::time::Duration;

    fn timeline(language: Language, base: SegmentIndex, verses: &[(VerseNumber, usize)]) -> Timeline {
        let mut timeline = Timeline::new(language, base);
        for &(verse, count) in verses {
            let segments = (0..count)
                .map(|i| Segment::new(i as f64, i as f64 + 1.0, "text"))
                .collect();
            timeline.push_verse(verse, segments);
        }
        timeline
    }

    fn pair(base: SegmentIndex, en: usize, pt: usize) -> Timelines {
        Timelines {
            english: timeline(Language::English, base, &[(1, en)]),
            portuguese: timeline(Language::Portuguese, base, &[(1, pt)]),
        }
    }

    // -------------------------------------------------------------------------
    // Alternate Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_alternate_order_starting_in_portuguese() {
        let plan = AlternatePlan::new(&pair(0, 2, 2), Language::Portuguese);
        let paths = ResourcePaths::new("1");

        let urls: Vec<String> = plan.steps().iter().map(|s| plan.url(&paths, s)).collect();
        assert_eq!(
            urls,
            vec![
                "audios/psalm_1/verses/1_pt.mp3",
                "audios/psalm_1/verses/1_en.mp3",
                "audios/psalm_1/verses/2_pt.mp3",
                "audios/psalm_1/verses/2_en.mp3",
            ]
        );
    }

    #[test]
    fn test_alternate_skips_missing_language() {
        let plan = AlternatePlan::new(&pair(0, 1, 3), Language::English);

        let steps: Vec<(usize, Language)> =
            plan.steps().iter().map(|s| (s.index, s.language)).collect();
        assert_eq!(
            steps,
            vec![
                (0, Language::English),
                (0, Language::Portuguese),
                (1, Language::Portuguese),
                (2, Language::Portuguese),
            ]
        );
    }

    #[test]
    fn test_alternate_uses_absolute_indices() {
        let plan = AlternatePlan::new(&pair(5, 1, 1), Language::Portuguese);
        let first = plan.first_step().unwrap();
        assert_eq!(first.index, 5);
        assert_eq!(
            plan.url(&ResourcePaths::new("2"), &first),
            "audios/psalm_2/verses/6_pt.mp3"
        );
    }

    #[test]
    fn test_alternate_empty_timelines_have_no_steps() {
        let plan = AlternatePlan::new(&Timelines::empty(), Language::Portuguese);
        assert_eq!(plan.first_step(), None);
        assert!(plan.steps().is_empty());
    }

    // -------------------------------------------------------------------------
    // Single Track Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_single_track_skips_verses_without_audio() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("audios/psalm_1/v.1_psalm_1_en.mp3", "");
        fetcher.insert("audios/psalm_1/v.3_psalm_1_en.mp3", "");
        let resolver =
            AudioResolver::new(fetcher, vec!["mp3".to_string()], Duration::from_millis(500));
        let english = timeline(Language::English, 0, &[(1, 2), (2, 2), (3, 1)]);

        let mut plan = SingleTrackPlan::resolve(&resolver, &ResourcePaths::new("1"), &english).await;

        let verses: Vec<VerseNumber> = plan.clips().iter().map(|c| c.verse).collect();
        assert_eq!(verses, vec![1, 3]);
        assert_eq!(plan.current().map(|c| c.span.start_index), Some(0));
        assert_eq!(plan.advance().map(|c| c.span.start_index), Some(4));
        assert_eq!(plan.advance(), None);
        assert_eq!(plan.advance(), None);
        assert_eq!(plan.final_index(), Some(4));
    }

    #[tokio::test]
    async fn test_single_track_skips_verses_without_captions() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("audios/psalm_1/v.1_psalm_1_en.mp3", "");
        let resolver =
            AudioResolver::new(fetcher, vec!["mp3".to_string()], Duration::from_millis(500));
        let english = timeline(Language::English, 0, &[(1, 0)]);

        let plan = SingleTrackPlan::resolve(&resolver, &ResourcePaths::new("1"), &english).await;
        assert!(plan.is_empty());
        assert_eq!(plan.final_index(), None);
    }
}
