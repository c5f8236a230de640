//! Audio Output Seam
//!
//! The engine never plays sound itself. An [`AudioOutput`] opens handles for
//! resource URLs; each handle reports progress through an [`AudioEvents`]
//! sink that feeds the reader's single event channel. Events carry the id of
//! the handle that produced them, so anything from a released handle can be
//! recognised and dropped.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::{CoreResult, HandleId, TimeSec};

// =============================================================================
// Events
// =============================================================================

/// Everything that can wake the reader besides a user command
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Progress or completion of an audio handle
    Audio(AudioEvent),
    /// A scheduled start delay elapsed for the session of `generation`
    Timer { generation: u64 },
}

/// Progress report of one audio handle
#[derive(Clone, Debug, PartialEq)]
pub struct AudioEvent {
    pub handle: HandleId,
    pub kind: AudioEventKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AudioEventKind {
    /// Playback position changed
    TimeUpdate(TimeSec),
    /// Playback reached the end of the resource
    Ended,
    /// Loading or decoding failed after `play()` was accepted
    Failed(String),
}

/// Event sink handed to one audio handle
#[derive(Clone, Debug)]
pub struct AudioEvents {
    handle: HandleId,
    sender: UnboundedSender<SessionEvent>,
}

impl AudioEvents {
    pub fn new(handle: HandleId, sender: UnboundedSender<SessionEvent>) -> Self {
        Self { handle, sender }
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    pub fn time_update(&self, time: TimeSec) {
        self.send(AudioEventKind::TimeUpdate(time));
    }

    pub fn ended(&self) {
        self.send(AudioEventKind::Ended);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        self.send(AudioEventKind::Failed(reason.into()));
    }

    fn send(&self, kind: AudioEventKind) {
        // The reader may already be gone; nothing is waiting for the event then.
        let _ = self.sender.send(SessionEvent::Audio(AudioEvent {
            handle: self.handle,
            kind,
        }));
    }
}

// =============================================================================
// Output Traits
// =============================================================================

/// Opens playable handles for audio resources
pub trait AudioOutput: Send + Sync {
    fn open(&self, url: &str, events: AudioEvents) -> Box<dyn AudioHandle>;
}

/// One playable audio resource
#[async_trait]
pub trait AudioHandle: Send + Sync {
    fn id(&self) -> HandleId;

    fn url(&self) -> &str;

    /// Starts playback; a rejection is reported as `PlaybackFailure`
    async fn play(&mut self) -> CoreResult<()>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    fn current_time(&self) -> TimeSec;

    fn set_current_time(&mut self, time: TimeSec);

    /// Stops event delivery for good
    fn detach(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_events_are_tagged_with_handle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = AudioEvents::new(7, tx);

        events.time_update(1.25);
        events.ended();

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::Audio(AudioEvent {
                handle: 7,
                kind: AudioEventKind::TimeUpdate(1.25)
            })
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::Audio(AudioEvent {
                handle: 7,
                kind: AudioEventKind::Ended
            })
        );
    }

    #[test]
    fn test_failure_carries_reason() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        AudioEvents::new(3, tx).failed("decode error");

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::Audio(AudioEvent {
                handle: 3,
                kind: AudioEventKind::Failed("decode error".to_string())
            })
        );
    }

    #[test]
    fn test_send_after_receiver_dropped_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        AudioEvents::new(1, tx).ended();
    }
}
