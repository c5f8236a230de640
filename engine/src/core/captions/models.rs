//! Caption Data Models
//!
//! A segment is one timed caption unit of one language track.

use serde::{Deserialize, Serialize};

use crate::core::{TimeSec, VerseNumber};

/// One timed unit of text within one language track
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Start offset in seconds, relative to the verse audio
    pub start: TimeSec,
    /// End offset in seconds (exclusive)
    pub end: TimeSec,
    /// Display text with caption markup removed
    pub main_text: String,
    /// Inline alternate text extracted from `{...}` markup (may be empty)
    pub translation: String,
    /// Verse number, set only on segments that open a verse
    pub verse_number: Option<VerseNumber>,
}

impl Segment {
    /// Creates a segment without translation or verse marker
    pub fn new(start: TimeSec, end: TimeSec, main_text: &str) -> Self {
        Self {
            start,
            end,
            main_text: main_text.to_string(),
            translation: String::new(),
            verse_number: None,
        }
    }

    /// Duration in seconds
    pub fn duration(&self) -> TimeSec {
        self.end - self.start
    }

    /// Whether `time` falls inside `[start, end)`
    pub fn contains(&self, time: TimeSec) -> bool {
        time >= self.start && time < self.end
    }

    /// Returns a copy carrying another segment's time range
    pub fn with_times_of(&self, other: &Segment) -> Self {
        Self {
            start: other.start,
            end: other.end,
            ..self.clone()
        }
    }
}
