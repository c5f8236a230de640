//! Recording Audio Output
//!
//! An [`AudioOutput`] that plays nothing and remembers everything: every
//! opened handle, its pause/rewind state and whether it is still attached.
//! Used by the command-line dry run and by tests, which drive playback by
//! emitting time updates and completions on the latest handle.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::audio::{AudioEvents, AudioHandle, AudioOutput};
use crate::core::{CoreError, CoreResult, HandleId, TimeSec};

/// Observable state of one recorded handle
#[derive(Clone, Debug, PartialEq)]
pub struct HandleRecord {
    pub id: HandleId,
    pub url: String,
    /// `play()` was called and accepted
    pub played: bool,
    pub paused: bool,
    pub current_time: TimeSec,
    pub detached: bool,
}

impl HandleRecord {
    /// Playing and still delivering events
    pub fn is_active(&self) -> bool {
        self.played && !self.paused && !self.detached
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    handles: Vec<(HandleRecord, AudioEvents)>,
    failing: HashSet<String>,
    auto_finish: bool,
}

/// Audio output that records instead of playing
#[derive(Clone, Debug, Default)]
pub struct RecordingOutput {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every accepted `play()` completes at once, for dry runs
    pub fn auto_finishing() -> Self {
        let output = Self::default();
        output.lock().auto_finish = true;
        output
    }

    /// Makes `play()` reject for `url`
    pub fn fail_url(&self, url: &str) {
        self.lock().failing.insert(url.to_string());
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn handles(&self) -> Vec<HandleRecord> {
        self.lock().handles.iter().map(|(r, _)| r.clone()).collect()
    }

    /// URLs of every opened handle, in order
    pub fn opened_urls(&self) -> Vec<String> {
        self.lock().handles.iter().map(|(r, _)| r.url.clone()).collect()
    }

    /// URLs whose `play()` was accepted, in order
    pub fn played_urls(&self) -> Vec<String> {
        self.lock()
            .handles
            .iter()
            .filter(|(r, _)| r.played)
            .map(|(r, _)| r.url.clone())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.lock()
            .handles
            .iter()
            .filter(|(r, _)| r.is_active())
            .count()
    }

    pub fn latest(&self) -> Option<HandleRecord> {
        self.lock().handles.last().map(|(r, _)| r.clone())
    }

    /// Reports a playback position on the latest attached handle
    pub fn emit_time(&self, time: TimeSec) -> bool {
        let mut state = self.lock();
        match state.handles.last_mut() {
            Some((record, events)) if !record.detached => {
                record.current_time = time;
                events.time_update(time);
                true
            }
            _ => false,
        }
    }

    /// Completes the latest attached handle
    pub fn finish_latest(&self) -> bool {
        let mut state = self.lock();
        match state.handles.last_mut() {
            Some((record, events)) if !record.detached => {
                record.paused = true;
                events.ended();
                true
            }
            _ => false,
        }
    }

    /// Reports a load or decode failure on the latest attached handle
    pub fn fail_latest(&self, reason: &str) -> bool {
        let mut state = self.lock();
        match state.handles.last_mut() {
            Some((record, events)) if !record.detached => {
                record.paused = true;
                events.failed(reason);
                true
            }
            _ => false,
        }
    }

    fn update(&self, id: HandleId, apply: impl FnOnce(&mut HandleRecord)) {
        let mut state = self.lock();
        if let Some((record, _)) = state.handles.iter_mut().find(|(r, _)| r.id == id) {
            apply(record);
        }
    }

    fn record(&self, id: HandleId) -> Option<HandleRecord> {
        self.lock()
            .handles
            .iter()
            .find(|(r, _)| r.id == id)
            .map(|(r, _)| r.clone())
    }
}

impl AudioOutput for RecordingOutput {
    fn open(&self, url: &str, events: AudioEvents) -> Box<dyn AudioHandle> {
        let id = events.handle();
        self.lock().handles.push((
            HandleRecord {
                id,
                url: url.to_string(),
                played: false,
                paused: true,
                current_time: 0.0,
                detached: false,
            },
            events,
        ));

        Box::new(RecordingHandle {
            id,
            url: url.to_string(),
            output: self.clone(),
        })
    }
}

/// Handle returned by [`RecordingOutput`]
#[derive(Debug)]
pub struct RecordingHandle {
    id: HandleId,
    url: String,
    output: RecordingOutput,
}

#[async_trait]
impl AudioHandle for RecordingHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn play(&mut self) -> CoreResult<()> {
        let mut state = self.output.lock();
        if state.failing.contains(&self.url) {
            return Err(CoreError::PlaybackFailure {
                url: self.url.clone(),
                reason: "playback rejected".to_string(),
            });
        }

        let auto_finish = state.auto_finish;
        if let Some((record, events)) = state.handles.iter_mut().find(|(r, _)| r.id == self.id) {
            record.played = true;
            record.paused = false;
            if auto_finish {
                record.paused = true;
                events.ended();
            }
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.output.update(self.id, |r| r.paused = true);
    }

    fn is_paused(&self) -> bool {
        self.output.record(self.id).is_none_or(|r| r.paused)
    }

    fn current_time(&self) -> TimeSec {
        self.output.record(self.id).map_or(0.0, |r| r.current_time)
    }

    fn set_current_time(&mut self, time: TimeSec) {
        self.output.update(self.id, |r| r.current_time = time);
    }

    fn detach(&mut self) {
        self.output.update(self.id, |r| r.detached = true);
    }
}
