//! Playback Module
//!
//! Narration modes and the single-handle audio discipline.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Playback                                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  audio.rs       - AudioOutput / AudioHandle seam, SessionEvent   │
//! │  recording.rs   - Recording output for dry runs and tests        │
//! │  session.rs     - Mode and highlight state                       │
//! │  narration.rs   - Single-track and alternate plans               │
//! │  controller.rs  - State machine driving the plans                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod audio;
mod controller;
mod narration;
mod recording;
mod session;

pub use audio::{AudioEvent, AudioEventKind, AudioEvents, AudioHandle, AudioOutput, SessionEvent};
pub use controller::PlaybackController;
pub use narration::{AlternatePlan, AlternateStep, SingleTrackPlan, VerseClip};
pub use recording::{HandleRecord, RecordingHandle, RecordingOutput};
pub use session::{PlaybackMode, PlaybackSession};
