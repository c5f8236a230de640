//! Playback Controller
//!
//! State machine over the narration modes. The controller owns the only audio
//! handle and the pending start timer; every mode entry begins with a full
//! stop, so at most one handle is ever attached.
//!
//! Progress arrives as [`SessionEvent`]s on the channel returned by
//! [`PlaybackController::new`]. Audio events are matched against the current
//! handle id and timer events against the session generation; anything else
//! is stale and dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::audio::{AudioEvent, AudioEventKind, AudioEvents, AudioHandle, AudioOutput, SessionEvent};
use super::narration::{AlternatePlan, AlternateStep, SingleTrackPlan};
use super::session::{PlaybackMode, PlaybackSession};
use crate::core::highlight::HighlightRenderer;
use crate::core::resources::ResourcePaths;
use crate::core::settings::ReaderSettings;
use crate::core::timeline::{Timeline, Timelines};
use crate::core::{HandleId, Language, SegmentIndex, TimeSec};

/// What the running mode plays next
#[derive(Debug, Default)]
enum Narration {
    #[default]
    None,
    Click {
        index: SegmentIndex,
    },
    Single {
        plan: SingleTrackPlan,
    },
    Alternate {
        plan: AlternatePlan,
        paths: ResourcePaths,
        step: Option<AlternateStep>,
    },
}

/// Drives narration and keeps the highlight in step with it
pub struct PlaybackController {
    output: Arc<dyn AudioOutput>,
    sender: UnboundedSender<SessionEvent>,
    session: PlaybackSession,
    handle: Option<Box<dyn AudioHandle>>,
    timer: Option<JoinHandle<()>>,
    narration: Narration,
    next_handle: HandleId,
    generation: u64,
    start_delay: Duration,
    intro_threshold: TimeSec,
}

impl PlaybackController {
    /// Creates a controller and the receiving end of its event channel
    pub fn new(
        output: Arc<dyn AudioOutput>,
        settings: &ReaderSettings,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            output,
            sender,
            session: PlaybackSession::default(),
            handle: None,
            timer: None,
            narration: Narration::None,
            next_handle: 1,
            generation: 0,
            start_delay: settings.start_delay(),
            intro_threshold: settings.intro_threshold_secs,
        };
        (controller, receiver)
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn mode(&self) -> PlaybackMode {
        self.session.mode
    }

    // =========================================================================
    // Stop
    // =========================================================================

    /// Stops whatever is running. Idempotent.
    ///
    /// The handle is detached, paused and rewound, the start timer is
    /// cancelled, and the mode returns to Idle. With `keep_highlights` the
    /// highlighted and clicked segments survive; otherwise both are cleared.
    pub fn stop(&mut self, keep_highlights: bool, renderer: &mut HighlightRenderer) {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.release_handle();

        if self.session.mode != PlaybackMode::Idle {
            info!(mode = ?self.session.mode, "Playback stopped");
        }
        self.narration = Narration::None;
        self.session.mode = PlaybackMode::Idle;

        if !keep_highlights {
            self.session.clear_highlights();
            renderer.clear_all();
        }
    }

    fn release_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.detach();
            handle.pause();
            handle.set_current_time(0.0);
            debug!(handle = handle.id(), url = handle.url(), "Released audio handle");
        }
    }

    // =========================================================================
    // Mode Entry
    // =========================================================================

    /// Plays the clip of one segment and highlights it in both tracks
    pub async fn start_click_segment(
        &mut self,
        paths: &ResourcePaths,
        index: SegmentIndex,
        language: Language,
        renderer: &mut HighlightRenderer,
    ) {
        self.stop(true, renderer);

        self.paint(index, renderer);
        self.session.last_clicked = Some(index);
        self.session.mode = PlaybackMode::ClickSegment;
        self.narration = Narration::Click { index };

        let url = paths.segment_audio(index, language);
        if !self.play(&url).await {
            self.narration = Narration::None;
            self.session.mode = PlaybackMode::Idle;
        }
    }

    /// Narrates verse clips of the English track in order
    pub fn start_single_track(&mut self, plan: SingleTrackPlan, renderer: &mut HighlightRenderer) {
        self.stop(false, renderer);

        let Some(first) = plan.current().map(|clip| clip.span.start_index) else {
            info!("No verse audio to narrate");
            return;
        };

        info!(clips = plan.clips().len(), "Single-track narration started");
        self.paint(first, renderer);
        self.session.mode = PlaybackMode::SingleTrack;
        self.narration = Narration::Single { plan };
        self.schedule_start();
    }

    /// Narrates segment by segment, `first` language then the other
    pub fn start_alternate(
        &mut self,
        paths: &ResourcePaths,
        timelines: &Timelines,
        first: Language,
        renderer: &mut HighlightRenderer,
    ) {
        self.stop(false, renderer);

        let plan = AlternatePlan::new(timelines, first);
        let Some(step) = plan.first_step() else {
            info!("No segments to narrate");
            return;
        };

        info!(segments = plan.total(), first = %first, "Alternate narration started");
        self.paint(step.index, renderer);
        self.session.mode = PlaybackMode::Alternate;
        self.narration = Narration::Alternate {
            plan,
            paths: paths.clone(),
            step: Some(step),
        };
        self.schedule_start();
    }

    fn schedule_start(&mut self) {
        let generation = self.generation;
        let sender = self.sender.clone();
        let delay = self.start_delay;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(SessionEvent::Timer { generation });
        }));
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Applies one event. `english` is the timeline single-track narration follows.
    pub async fn handle_event(
        &mut self,
        event: SessionEvent,
        english: &Timeline,
        renderer: &mut HighlightRenderer,
    ) {
        match event {
            SessionEvent::Timer { generation } => {
                if generation != self.generation || self.timer.is_none() {
                    debug!(generation, "Ignoring stale start timer");
                    return;
                }
                self.timer = None;
                self.resume(renderer).await;
            }
            SessionEvent::Audio(AudioEvent { handle, kind }) => {
                if self.handle.as_ref().map(|h| h.id()) != Some(handle) {
                    debug!(handle, "Ignoring event from released handle");
                    return;
                }
                match kind {
                    AudioEventKind::TimeUpdate(time) => self.on_time_update(time, english, renderer),
                    AudioEventKind::Ended => self.on_ended(renderer).await,
                    AudioEventKind::Failed(reason) => {
                        warn!(handle, reason = %reason, "Audio failed during playback");
                        self.on_failed(renderer).await;
                    }
                }
            }
        }
    }

    fn on_time_update(&mut self, time: TimeSec, english: &Timeline, renderer: &mut HighlightRenderer) {
        let Narration::Single { plan } = &self.narration else {
            return;
        };
        let Some(span) = plan.current().map(|clip| clip.span) else {
            return;
        };
        if let Some(index) = english.locate(time, &span, self.intro_threshold) {
            if self.session.highlighted != Some(index) {
                self.paint(index, renderer);
            }
        }
    }

    async fn on_ended(&mut self, renderer: &mut HighlightRenderer) {
        match &mut self.narration {
            Narration::Click { index } => {
                let index = *index;
                self.release_handle();
                self.paint(index, renderer);
                self.narration = Narration::None;
                self.session.mode = PlaybackMode::Idle;
            }
            Narration::Single { plan } => {
                plan.advance();
                self.play_single(renderer).await;
            }
            Narration::Alternate { plan, step, .. } => {
                *step = step.and_then(|current| plan.next_step(&current));
                self.play_alternate(renderer).await;
            }
            Narration::None => self.release_handle(),
        }
    }

    /// A clip that fails after starting counts as finished, except a clicked
    /// segment, which returns to Idle keeping its highlight
    async fn on_failed(&mut self, renderer: &mut HighlightRenderer) {
        if let Narration::Click { .. } = self.narration {
            self.release_handle();
            self.narration = Narration::None;
            self.session.mode = PlaybackMode::Idle;
            return;
        }
        self.on_ended(renderer).await;
    }

    /// Starts the pending clip of the running mode
    async fn resume(&mut self, renderer: &mut HighlightRenderer) {
        match self.narration {
            Narration::Single { .. } => self.play_single(renderer).await,
            Narration::Alternate { .. } => self.play_alternate(renderer).await,
            Narration::Click { .. } | Narration::None => {}
        }
    }

    // =========================================================================
    // Sequencing
    // =========================================================================

    async fn play_single(&mut self, renderer: &mut HighlightRenderer) {
        loop {
            let Narration::Single { plan } = &self.narration else {
                return;
            };
            let Some(clip) = plan.current() else {
                self.finish_single(renderer);
                return;
            };
            let (url, first) = (clip.url.clone(), clip.span.start_index);

            self.paint(first, renderer);
            if self.play(&url).await {
                return;
            }
            if let Narration::Single { plan } = &mut self.narration {
                plan.advance();
            }
        }
    }

    fn finish_single(&mut self, renderer: &mut HighlightRenderer) {
        let final_index = match &self.narration {
            Narration::Single { plan } => plan.final_index(),
            _ => None,
        };
        self.release_handle();
        if let Some(index) = final_index {
            self.paint(index, renderer);
        }
        self.narration = Narration::None;
        self.session.mode = PlaybackMode::Idle;
        info!("Single-track narration finished");
    }

    async fn play_alternate(&mut self, renderer: &mut HighlightRenderer) {
        loop {
            let Narration::Alternate { plan, paths, step } = &self.narration else {
                return;
            };
            let Some(current) = *step else {
                self.release_handle();
                self.narration = Narration::None;
                self.session.mode = PlaybackMode::Idle;
                info!("Alternate narration finished");
                return;
            };
            let url = plan.url(paths, &current);

            self.paint(current.index, renderer);
            if self.play(&url).await {
                return;
            }
            if let Narration::Alternate { plan, step, .. } = &mut self.narration {
                *step = plan.next_step(&current);
            }
        }
    }

    /// Opens and plays `url` as the only handle; false when playback was rejected
    async fn play(&mut self, url: &str) -> bool {
        self.release_handle();

        let id = self.next_handle;
        self.next_handle += 1;
        let mut handle = self
            .output
            .open(url, AudioEvents::new(id, self.sender.clone()));

        match handle.play().await {
            Ok(()) => {
                debug!(handle = id, url, "Playing");
                self.handle = Some(handle);
                true
            }
            Err(e) => {
                warn!(url, error = %e, "Playback failed");
                handle.detach();
                false
            }
        }
    }

    fn paint(&mut self, index: SegmentIndex, renderer: &mut HighlightRenderer) {
        self.session.highlighted = Some(index);
        renderer.highlight_pair(index);
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
