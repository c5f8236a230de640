//! Highlight Renderer
//!
//! Keeps one text container per language, each holding one element per
//! timeline segment, and guarantees that at most one element per container is
//! active. Every visible change is mirrored to a [`RenderSurface`].
//!
//! Indices are never derived from what is displayed: elements carry the
//! absolute index the timeline assigned them.

mod markup;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::playback::PlaybackSession;
use crate::core::timeline::{Timeline, Timelines};
use crate::core::{DisplayMode, Language, SegmentIndex, VerseNumber};

pub use markup::{render_text, RenderedText};

/// Message shown when a lesson has no verses yet
pub const EMPTY_LESSON_MESSAGE: &str = "This lesson has no content yet.";

// =============================================================================
// Highlight Style
// =============================================================================

/// Gradient used to paint the active segment of a track
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HighlightStyle {
    pub from: &'static str,
    pub to: &'static str,
}

impl HighlightStyle {
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::English => Self {
                from: "#cf6270",
                to: "#8576d6",
            },
            Language::Portuguese => Self {
                from: "#4784f2",
                to: "#8576d6",
            },
        }
    }
}

// =============================================================================
// Elements
// =============================================================================

/// One displayed segment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentElement {
    pub index: SegmentIndex,
    pub language: Language,
    pub verse_number: Option<VerseNumber>,
    pub text: RenderedText,
    pub translation: String,
    pub active: bool,
}

/// Elements of one language track
#[derive(Clone, Debug, PartialEq)]
pub struct TextContainer {
    language: Language,
    elements: Vec<SegmentElement>,
}

impl TextContainer {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            elements: Vec::new(),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn elements(&self) -> &[SegmentElement] {
        &self.elements
    }

    pub fn element(&self, index: SegmentIndex) -> Option<&SegmentElement> {
        self.elements.iter().find(|e| e.index == index)
    }

    pub fn active_index(&self) -> Option<SegmentIndex> {
        self.elements.iter().find(|e| e.active).map(|e| e.index)
    }

    pub fn active_count(&self) -> usize {
        self.elements.iter().filter(|e| e.active).count()
    }

    fn fill(&mut self, timeline: &Timeline) {
        self.elements = timeline
            .iter_indexed()
            .enumerate()
            .map(|(position, (index, segment))| SegmentElement {
                index,
                language: self.language,
                verse_number: segment.verse_number,
                text: render_text(&segment.main_text, position == 0),
                translation: segment.translation.clone(),
                active: false,
            })
            .collect();
    }

    /// Marks `index` active and everything else inactive; returns the indices
    /// whose state changed
    fn set_active(&mut self, index: Option<SegmentIndex>) -> Vec<(SegmentIndex, bool)> {
        let mut changed = Vec::new();
        for element in &mut self.elements {
            let active = Some(element.index) == index;
            if element.active != active {
                element.active = active;
                changed.push((element.index, active));
            }
        }
        changed
    }
}

// =============================================================================
// Render Surface
// =============================================================================

/// Where the renderer's state becomes visible
pub trait RenderSurface: Send {
    /// Replaces the content of a language container
    fn mount(&mut self, language: Language, elements: &[SegmentElement]);

    /// Paints or clears the active styling of one element
    fn paint(&mut self, language: Language, index: SegmentIndex, active: Option<HighlightStyle>);

    fn show_counter(&mut self, position: usize, total: usize);

    fn set_translation_visible(&mut self, visible: bool);

    fn show_placeholder(&mut self, message: &str);
}

/// Surface that displays nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn mount(&mut self, _language: Language, _elements: &[SegmentElement]) {}

    fn paint(&mut self, _language: Language, _index: SegmentIndex, _active: Option<HighlightStyle>) {}

    fn show_counter(&mut self, _position: usize, _total: usize) {}

    fn set_translation_visible(&mut self, _visible: bool) {}

    fn show_placeholder(&mut self, _message: &str) {}
}

// =============================================================================
// Renderer
// =============================================================================

/// Owns both text containers and the visible reader chrome
pub struct HighlightRenderer {
    english: TextContainer,
    portuguese: TextContainer,
    surface: Box<dyn RenderSurface>,
    counter: Option<(usize, usize)>,
    translation_visible: bool,
    placeholder: Option<String>,
}

impl HighlightRenderer {
    pub fn new(surface: Box<dyn RenderSurface>) -> Self {
        Self {
            english: TextContainer::new(Language::English),
            portuguese: TextContainer::new(Language::Portuguese),
            surface,
            counter: None,
            translation_visible: false,
            placeholder: None,
        }
    }

    pub fn container(&self, language: Language) -> &TextContainer {
        match language {
            Language::English => &self.english,
            Language::Portuguese => &self.portuguese,
        }
    }

    fn container_mut(&mut self, language: Language) -> &mut TextContainer {
        match language {
            Language::English => &mut self.english,
            Language::Portuguese => &mut self.portuguese,
        }
    }

    /// Replaces a container's elements with the segments of `timeline`
    pub fn mount(&mut self, timeline: &Timeline) {
        self.placeholder = None;
        let container = self.container_mut(timeline.language);
        container.fill(timeline);
        let elements = container.elements.clone();
        self.surface.mount(timeline.language, &elements);
    }

    pub fn mount_pair(&mut self, timelines: &Timelines) {
        self.mount(&timelines.english);
        self.mount(&timelines.portuguese);
    }

    /// Makes `index` the only active element of the `language` container.
    ///
    /// Returns false (and leaves nothing active) when the container has no
    /// element at `index`.
    pub fn highlight(&mut self, index: SegmentIndex, language: Language) -> bool {
        self.apply(language, Some(index));
        let found = self.container(language).element(index).is_some();
        if !found {
            debug!(index, language = %language, "No element to highlight");
        }
        found
    }

    /// Highlights the same index in both tracks
    pub fn highlight_pair(&mut self, index: SegmentIndex) {
        for language in Language::ALL {
            self.highlight(index, language);
        }
    }

    pub fn clear(&mut self, language: Language) {
        self.apply(language, None);
    }

    pub fn clear_all(&mut self) {
        for language in Language::ALL {
            self.clear(language);
        }
    }

    fn apply(&mut self, language: Language, index: Option<SegmentIndex>) {
        let changed = self.container_mut(language).set_active(index);
        let style = HighlightStyle::for_language(language);
        for (element, active) in changed {
            self.surface
                .paint(language, element, active.then_some(style));
        }
    }

    /// Ephemeral highlight while the pointer is over a segment
    pub fn hover(&mut self, index: SegmentIndex) {
        self.highlight_pair(index);
    }

    /// Restores what was committed before the hover
    pub fn hover_end(&mut self, session: &PlaybackSession, display_mode: DisplayMode) {
        match session.committed() {
            Some(index) => self.highlight_pair(index),
            None if display_mode == DisplayMode::Horizontal => self.highlight_pair(0),
            None => self.clear_all(),
        }
    }

    pub fn active_index(&self, language: Language) -> Option<SegmentIndex> {
        self.container(language).active_index()
    }

    // -------------------------------------------------------------------------
    // Reader chrome
    // -------------------------------------------------------------------------

    pub fn show_counter(&mut self, position: usize, total: usize) {
        self.counter = Some((position, total));
        self.surface.show_counter(position, total);
    }

    pub fn counter(&self) -> Option<(usize, usize)> {
        self.counter
    }

    pub fn set_translation_visible(&mut self, visible: bool) {
        self.translation_visible = visible;
        self.surface.set_translation_visible(visible);
    }

    pub fn translation_visible(&self) -> bool {
        self.translation_visible
    }

    /// Empties both containers and shows `message` instead
    pub fn show_placeholder(&mut self, message: &str) {
        self.english = TextContainer::new(Language::English);
        self.portuguese = TextContainer::new(Language::Portuguese);
        self.surface.mount(Language::English, &[]);
        self.surface.mount(Language::Portuguese, &[]);
        self.placeholder = Some(message.to_string());
        self.surface.show_placeholder(message);
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }
}
