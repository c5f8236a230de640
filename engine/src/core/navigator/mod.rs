//! Verse Navigator
//!
//! Vertical-mode paging state: the verse being read, circular stepping over
//! the discovered verse set, swipe recognition, the `position/total` counter
//! and per-verse translation visibility.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::VerseNumber;

/// Direction of a verse step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDirection {
    Next,
    Previous,
}

/// Paging state of the vertical reader
#[derive(Clone, Debug, PartialEq)]
pub struct VerseNavigator {
    current: VerseNumber,
    swipe_threshold: f64,
    touch_start_x: Option<f64>,
    translation_visibility: HashMap<VerseNumber, bool>,
}

impl VerseNavigator {
    pub fn new(current: VerseNumber, swipe_threshold: f64) -> Self {
        Self {
            current,
            swipe_threshold,
            touch_start_x: None,
            translation_visibility: HashMap::new(),
        }
    }

    pub fn current(&self) -> VerseNumber {
        self.current
    }

    pub fn set_current(&mut self, verse: VerseNumber) {
        self.current = verse;
    }

    /// The verse one step away from the current one, wrapping around.
    ///
    /// A current verse outside `verses` steps to the first (next) or last
    /// (previous) verse. `None` only for an empty set.
    pub fn peek(&self, verses: &[VerseNumber], direction: StepDirection) -> Option<VerseNumber> {
        if verses.is_empty() {
            return None;
        }
        let last = verses.len() - 1;
        let target = match (verses.iter().position(|&v| v == self.current), direction) {
            (Some(i), StepDirection::Next) => if i == last { 0 } else { i + 1 },
            (Some(i), StepDirection::Previous) => if i == 0 { last } else { i - 1 },
            (None, StepDirection::Next) => 0,
            (None, StepDirection::Previous) => last,
        };
        verses.get(target).copied()
    }

    /// Moves one step and returns the new current verse
    pub fn step(&mut self, verses: &[VerseNumber], direction: StepDirection) -> Option<VerseNumber> {
        let target = self.peek(verses, direction)?;
        debug!(from = self.current, to = target, ?direction, "Verse step");
        self.current = target;
        Some(target)
    }

    // -------------------------------------------------------------------------
    // Swipe
    // -------------------------------------------------------------------------

    pub fn touch_start(&mut self, x: f64) {
        self.touch_start_x = Some(x);
    }

    /// Ends a touch; a leftward travel beyond the threshold means next,
    /// rightward means previous
    pub fn touch_end(&mut self, x: f64) -> Option<StepDirection> {
        let start = self.touch_start_x.take()?;
        let diff = start - x;
        if diff.abs() <= self.swipe_threshold {
            return None;
        }
        Some(if diff > 0.0 {
            StepDirection::Next
        } else {
            StepDirection::Previous
        })
    }

    // -------------------------------------------------------------------------
    // Counter
    // -------------------------------------------------------------------------

    /// `(position, total)`; position is 1 when the current verse is not in the set
    pub fn counter(&self, verses: &[VerseNumber]) -> (usize, usize) {
        let position = verses
            .iter()
            .position(|&v| v == self.current)
            .map_or(1, |i| i + 1);
        (position, verses.len())
    }

    // -------------------------------------------------------------------------
    // Translation visibility
    // -------------------------------------------------------------------------

    /// Whether the current verse shows its translation; hidden until toggled
    pub fn translation_visible(&self) -> bool {
        self.translation_visibility
            .get(&self.current)
            .copied()
            .unwrap_or(false)
    }

    /// Flips the current verse's flag and returns the new value
    pub fn toggle_translation(&mut self) -> bool {
        let visible = !self.translation_visible();
        self.translation_visibility.insert(self.current, visible);
        visible
    }

    pub fn reset_translation_visibility(&mut self) {
        self.translation_visibility.clear();
    }
}
