//! Timeline Model Definitions
//!
//! A timeline is the ordered, index-addressable segment sequence of one
//! language. Indices are absolute: a timeline holding a single verse starts
//! at the number of segments of the verses before it.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::captions::Segment;
use crate::core::{Language, SegmentIndex, TimeSec, VerseNumber};

// =============================================================================
// Verse Span
// =============================================================================

/// Where one verse's segments sit inside a timeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerseSpan {
    pub verse: VerseNumber,
    /// Absolute index of the verse's first segment
    pub start_index: SegmentIndex,
    pub len: usize,
}

impl VerseSpan {
    /// Absolute index one past the verse's last segment
    pub fn end_index(&self) -> SegmentIndex {
        self.start_index + self.len
    }

    pub fn indices(&self) -> Range<SegmentIndex> {
        self.start_index..self.end_index()
    }

    pub fn contains(&self, index: SegmentIndex) -> bool {
        self.indices().contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// =============================================================================
// Timeline
// =============================================================================

/// Segments of one language across one or more verses
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub language: Language,
    /// Absolute index of the first segment
    pub base_index: SegmentIndex,
    segments: Vec<Segment>,
    spans: Vec<VerseSpan>,
}

impl Timeline {
    pub fn new(language: Language, base_index: SegmentIndex) -> Self {
        Self {
            language,
            base_index,
            segments: Vec::new(),
            spans: Vec::new(),
        }
    }

    /// Appends a verse's segments, recording its span
    pub fn push_verse(&mut self, verse: VerseNumber, segments: Vec<Segment>) {
        self.spans.push(VerseSpan {
            verse,
            start_index: self.end_index(),
            len: segments.len(),
        });
        self.segments.extend(segments);
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn spans(&self) -> &[VerseSpan] {
        &self.spans
    }

    /// Absolute index one past the last segment
    pub fn end_index(&self) -> SegmentIndex {
        self.base_index + self.segments.len()
    }

    pub fn indices(&self) -> Range<SegmentIndex> {
        self.base_index..self.end_index()
    }

    /// Segment at an absolute index
    pub fn get(&self, index: SegmentIndex) -> Option<&Segment> {
        index
            .checked_sub(self.base_index)
            .and_then(|local| self.segments.get(local))
    }

    pub fn last_index(&self) -> Option<SegmentIndex> {
        self.end_index().checked_sub(1).filter(|_| !self.is_empty())
    }

    pub fn span_for(&self, verse: VerseNumber) -> Option<&VerseSpan> {
        self.spans.iter().find(|span| span.verse == verse)
    }

    /// Segments paired with their absolute indices
    pub fn iter_indexed(&self) -> impl Iterator<Item = (SegmentIndex, &Segment)> {
        self.segments
            .iter()
            .enumerate()
            .map(move |(i, segment)| (self.base_index + i, segment))
    }

    /// Maps a playback time inside a verse clip to the active segment.
    ///
    /// During the opening `intro_threshold` the verse's first segment is
    /// active. Otherwise the first segment of the span whose `[start, end)`
    /// contains `time` wins; `None` when no segment does.
    pub fn locate(
        &self,
        time: TimeSec,
        span: &VerseSpan,
        intro_threshold: TimeSec,
    ) -> Option<SegmentIndex> {
        if span.is_empty() {
            return None;
        }
        if time < intro_threshold {
            return Some(span.start_index);
        }
        span.indices()
            .find(|&index| self.get(index).is_some_and(|segment| segment.contains(time)))
    }

    /// Overwrites segment times with those of `reference` for every shared index
    pub fn align_times_to(&mut self, reference: &Timeline) {
        let base = self.base_index;
        for (local, segment) in self.segments.iter_mut().enumerate() {
            if let Some(source) = reference.get(base + local) {
                *segment = segment.with_times_of(source);
            }
        }
    }
}

// =============================================================================
// Timeline Pair
// =============================================================================

/// The English and Portuguese timelines of the same verse range
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timelines {
    pub english: Timeline,
    pub portuguese: Timeline,
}

impl Timelines {
    pub fn empty() -> Self {
        Self {
            english: Timeline::new(Language::English, 0),
            portuguese: Timeline::new(Language::Portuguese, 0),
        }
    }

    pub fn get(&self, language: Language) -> &Timeline {
        match language {
            Language::English => &self.english,
            Language::Portuguese => &self.portuguese,
        }
    }

    /// Forces the Portuguese track onto the English timing
    pub fn align(&mut self) {
        self.portuguese.align_times_to(&self.english);
    }

    /// True when neither language has a segment
    pub fn is_empty(&self) -> bool {
        self.english.is_empty() && self.portuguese.is_empty()
    }
}
