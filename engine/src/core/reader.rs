//! Reader
//!
//! Composition root of a reading session. The reader owns every component of
//! one lesson and applies user commands and playback events strictly one at a
//! time from a single task.
//!
//! # Architecture
//!
//! ```text
//!   ReaderCommand ──┐                      ┌── SessionEvent (audio, timer)
//!                   ▼                      ▼
//!              ┌──────────────────────────────────┐
//!              │              Reader              │
//!              ├──────────────────────────────────┤
//!              │ VerseDiscovery  TimelineBuilder  │
//!              │ PlaybackController               │
//!              │ HighlightRenderer VerseNavigator │
//!              └──────────────────────────────────┘
//!                   │                      │
//!                   ▼                      ▼
//!            ResourceFetcher         RenderSurface / AudioOutput
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::core::captions::CaptionLoader;
use crate::core::fs::validate_path_id_component;
use crate::core::highlight::{HighlightRenderer, RenderSurface, EMPTY_LESSON_MESSAGE};
use crate::core::navigator::{StepDirection, VerseNavigator};
use crate::core::playback::{
    AudioOutput, PlaybackController, PlaybackMode, PlaybackSession, SessionEvent, SingleTrackPlan,
};
use crate::core::resources::{AudioResolver, KeyValueCache, ResourceFetcher, ResourcePaths};
use crate::core::settings::ReaderSettings;
use crate::core::timeline::{TimelineBuilder, Timelines};
use crate::core::verses::VerseDiscovery;
use crate::core::{
    CoreError, CoreResult, DisplayMode, Language, LessonId, SegmentIndex, VerseNumber,
};

/// Cache key of the persisted reader state
pub const READER_STATE_KEY: &str = "readerState";

// =============================================================================
// Commands and State
// =============================================================================

/// User intent delivered to the reader
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReaderCommand {
    PlaySingleTrack,
    PlayAlternate,
    ClickSegment {
        index: SegmentIndex,
        language: Language,
    },
    Hover {
        index: SegmentIndex,
    },
    HoverEnd,
    NextVerse,
    PreviousVerse,
    TouchStart {
        x: f64,
    },
    TouchEnd {
        x: f64,
    },
    ToggleTranslation,
    ToggleDisplayMode,
    Stop,
}

/// Reader position persisted across sessions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderState {
    pub lesson_id: LessonId,
    pub current_verse: VerseNumber,
    pub display_mode: DisplayMode,
}

// =============================================================================
// Reader
// =============================================================================

/// One lesson being read
pub struct Reader {
    lesson: LessonId,
    paths: ResourcePaths,
    settings: ReaderSettings,
    display_mode: DisplayMode,
    discovery: VerseDiscovery,
    builder: TimelineBuilder,
    resolver: AudioResolver,
    state_cache: Arc<dyn KeyValueCache>,
    controller: PlaybackController,
    events: UnboundedReceiver<SessionEvent>,
    renderer: HighlightRenderer,
    navigator: VerseNavigator,
    verses: Vec<VerseNumber>,
    timelines: Timelines,
}

impl Reader {
    /// Wires up a reader for `lesson`. Nothing is fetched until
    /// [`Reader::initialize`].
    ///
    /// `cache` holds caption text and the reader state.
    pub fn new(
        lesson: &str,
        fetcher: Arc<dyn ResourceFetcher>,
        cache: Arc<dyn KeyValueCache>,
        output: Arc<dyn AudioOutput>,
        surface: Box<dyn RenderSurface>,
        settings: ReaderSettings,
    ) -> CoreResult<Self> {
        validate_path_id_component(lesson, "lesson id").map_err(CoreError::ValidationError)?;
        let lesson = lesson.trim().to_string();

        let loader = CaptionLoader::new(fetcher.clone(), cache.clone(), settings.caption_timeout());
        let resolver = AudioResolver::new(
            fetcher.clone(),
            settings.audio_extensions.clone(),
            settings.audio_resolve_timeout(),
        );
        let (controller, events) = PlaybackController::new(output, &settings);

        Ok(Self {
            paths: ResourcePaths::new(&lesson),
            display_mode: settings.display_mode,
            discovery: VerseDiscovery::new(fetcher, &settings),
            builder: TimelineBuilder::new(Arc::new(loader)),
            resolver,
            state_cache: cache,
            controller,
            events,
            renderer: HighlightRenderer::new(surface),
            navigator: VerseNavigator::new(1, settings.swipe_threshold_px),
            verses: Vec::new(),
            timelines: Timelines::empty(),
            settings,
            lesson,
        })
    }

    /// Creates a reader, restores its saved position and initializes it
    pub async fn open(
        lesson: &str,
        fetcher: Arc<dyn ResourceFetcher>,
        cache: Arc<dyn KeyValueCache>,
        output: Arc<dyn AudioOutput>,
        surface: Box<dyn RenderSurface>,
        settings: ReaderSettings,
    ) -> CoreResult<Self> {
        let mut reader = Self::new(lesson, fetcher, cache, output, surface, settings)?;
        reader.restore_state().await;
        reader.initialize().await;
        Ok(reader)
    }

    pub fn lesson(&self) -> &str {
        &self.lesson
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    pub fn verses(&self) -> &[VerseNumber] {
        &self.verses
    }

    pub fn timelines(&self) -> &Timelines {
        &self.timelines
    }

    pub fn renderer(&self) -> &HighlightRenderer {
        &self.renderer
    }

    pub fn session(&self) -> &PlaybackSession {
        self.controller.session()
    }

    pub fn mode(&self) -> PlaybackMode {
        self.controller.mode()
    }

    pub fn current_verse(&self) -> VerseNumber {
        self.navigator.current()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Discovers verses and mounts the timelines of the current display mode
    pub async fn initialize(&mut self) {
        self.controller.stop(false, &mut self.renderer);

        self.verses = self.discovery.discover(&self.lesson).await;
        if self.verses.is_empty() {
            info!(lesson = %self.lesson, "Lesson has no content");
            self.timelines = Timelines::empty();
            self.renderer.show_placeholder(EMPTY_LESSON_MESSAGE);
            return;
        }

        match self.display_mode {
            DisplayMode::Horizontal => {
                self.timelines = self.builder.build_pair(&self.lesson, &self.verses).await;
                self.renderer.mount_pair(&self.timelines);
                self.renderer.highlight_pair(0);
            }
            DisplayMode::Vertical => self.load_current_verse().await,
        }

        info!(
            lesson = %self.lesson,
            verses = self.verses.len(),
            segments = self.timelines.english.len(),
            mode = ?self.display_mode,
            "Reader initialized"
        );
    }

    /// Builds and mounts the current verse, falling back to verse 1 when it
    /// has no captions in either language
    async fn load_current_verse(&mut self) {
        let mut verse = self.navigator.current();
        self.timelines = self
            .builder
            .build_verse_pair(&self.lesson, verse, &self.verses)
            .await;

        if self.timelines.is_empty() && verse != 1 {
            warn!(lesson = %self.lesson, verse, "Verse has no captions, showing verse 1");
            verse = 1;
            self.navigator.set_current(verse);
            self.timelines = self
                .builder
                .build_verse_pair(&self.lesson, verse, &self.verses)
                .await;
        }

        self.renderer.mount_pair(&self.timelines);
        let (position, total) = self.navigator.counter(&self.verses);
        self.renderer.show_counter(position, total);
        self.renderer
            .set_translation_visible(self.navigator.translation_visible());
        self.persist_state().await;
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub async fn handle(&mut self, command: ReaderCommand) {
        debug!(?command, "Reader command");
        match command {
            ReaderCommand::PlaySingleTrack => self.play_single_track().await,
            ReaderCommand::PlayAlternate => self.play_alternate(),
            ReaderCommand::ClickSegment { index, language } => {
                self.controller
                    .start_click_segment(&self.paths, index, language, &mut self.renderer)
                    .await;
            }
            ReaderCommand::Hover { index } => self.renderer.hover(index),
            ReaderCommand::HoverEnd => self
                .renderer
                .hover_end(self.controller.session(), self.display_mode),
            ReaderCommand::NextVerse => self.navigate(StepDirection::Next).await,
            ReaderCommand::PreviousVerse => self.navigate(StepDirection::Previous).await,
            ReaderCommand::TouchStart { x } => self.navigator.touch_start(x),
            ReaderCommand::TouchEnd { x } => {
                if let Some(direction) = self.navigator.touch_end(x) {
                    self.navigate(direction).await;
                }
            }
            ReaderCommand::ToggleTranslation => self.toggle_translation(),
            ReaderCommand::ToggleDisplayMode => self.toggle_display_mode().await,
            ReaderCommand::Stop => self.controller.stop(false, &mut self.renderer),
        }
    }

    async fn play_single_track(&mut self) {
        if self.controller.mode() == PlaybackMode::SingleTrack {
            self.controller.stop(false, &mut self.renderer);
            return;
        }
        self.controller.stop(false, &mut self.renderer);

        let plan =
            SingleTrackPlan::resolve(&self.resolver, &self.paths, &self.timelines.english).await;
        self.controller.start_single_track(plan, &mut self.renderer);
    }

    fn play_alternate(&mut self) {
        if self.controller.mode() == PlaybackMode::Alternate {
            self.controller.stop(false, &mut self.renderer);
            return;
        }
        self.controller.start_alternate(
            &self.paths,
            &self.timelines,
            self.settings.alternate_start_language,
            &mut self.renderer,
        );
    }

    fn toggle_translation(&mut self) {
        let visible = match self.display_mode {
            DisplayMode::Vertical => self.navigator.toggle_translation(),
            DisplayMode::Horizontal => !self.renderer.translation_visible(),
        };
        self.renderer.set_translation_visible(visible);
    }

    /// Steps to the neighbouring verse in vertical mode
    async fn navigate(&mut self, direction: StepDirection) {
        if self.display_mode != DisplayMode::Vertical {
            debug!(?direction, "Verse navigation ignored in horizontal mode");
            return;
        }
        self.controller.stop(false, &mut self.renderer);

        self.discovery.invalidate(&self.lesson);
        self.verses = self.discovery.discover(&self.lesson).await;
        if self.navigator.step(&self.verses, direction).is_none() {
            self.timelines = Timelines::empty();
            self.renderer.show_placeholder(EMPTY_LESSON_MESSAGE);
            return;
        }
        self.load_current_verse().await;
    }

    /// Shows `verse` in vertical mode; in horizontal mode only the navigator
    /// position changes
    pub async fn jump_to_verse(&mut self, verse: VerseNumber) {
        self.controller.stop(false, &mut self.renderer);
        self.navigator.set_current(verse);
        if self.display_mode == DisplayMode::Vertical && !self.verses.is_empty() {
            self.load_current_verse().await;
        }
    }

    /// Switches between the horizontal and vertical layouts
    pub async fn toggle_display_mode(&mut self) {
        self.controller.stop(false, &mut self.renderer);
        if self.display_mode == DisplayMode::Vertical {
            self.navigator.reset_translation_visibility();
        }
        self.display_mode = self.display_mode.toggled();
        info!(mode = ?self.display_mode, "Display mode changed");

        self.persist_state().await;
        self.initialize().await;
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub async fn handle_session_event(&mut self, event: SessionEvent) {
        self.controller
            .handle_event(event, &self.timelines.english, &mut self.renderer)
            .await;
    }

    /// Waits for the next playback event and applies it. False once the
    /// event channel is closed.
    pub async fn process_next_event(&mut self) -> bool {
        match self.events.recv().await {
            Some(event) => {
                self.handle_session_event(event).await;
                true
            }
            None => false,
        }
    }

    /// Applies every playback event already queued; returns how many
    pub async fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_session_event(event).await;
            applied += 1;
        }
        applied
    }

    /// Event loop: applies commands and playback events one at a time until
    /// the command channel closes, then stops playback
    pub async fn run(&mut self, mut commands: UnboundedReceiver<ReaderCommand>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                Some(event) = self.events.recv() => self.handle_session_event(event).await,
            }
        }
        self.controller.stop(true, &mut self.renderer);
        debug!(lesson = %self.lesson, "Reader loop finished");
    }

    // =========================================================================
    // Reader State
    // =========================================================================

    /// Applies the saved verse and display mode when they belong to this lesson
    pub async fn restore_state(&mut self) {
        let Some(raw) = self.state_cache.get(READER_STATE_KEY).await else {
            return;
        };
        match serde_json::from_str::<ReaderState>(&raw) {
            Ok(state) if state.lesson_id == self.lesson => {
                debug!(verse = state.current_verse, mode = ?state.display_mode, "Restored reader state");
                self.navigator.set_current(state.current_verse);
                self.display_mode = state.display_mode;
            }
            Ok(state) => debug!(saved = %state.lesson_id, "Reader state belongs to another lesson"),
            Err(e) => warn!("Ignoring unreadable reader state: {}", e),
        }
    }

    async fn persist_state(&self) {
        let state = ReaderState {
            lesson_id: self.lesson.clone(),
            current_verse: self.navigator.current(),
            display_mode: self.display_mode,
        };
        match serde_json::to_string(&state) {
            Ok(json) => self.state_cache.set(READER_STATE_KEY, &json).await,
            Err(e) => warn!("Failed to serialize reader state: {}", e),
        }
    }
}
