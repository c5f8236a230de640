//! Playback Session State
//!
//! The explicit record of what the reader is doing: which narration mode is
//! running, which segment is highlighted, and which one the user last
//! clicked. Owned by the playback controller and lent to the renderer.

use serde::{Deserialize, Serialize};

use crate::core::SegmentIndex;

/// Narration mode currently running
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    #[default]
    Idle,
    /// Verse clips in the English track, one after another
    SingleTrack,
    /// Per-segment clips, alternating languages
    Alternate,
    /// A single segment clip started by a click
    ClickSegment,
}

/// Highlight and mode state of the current session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackSession {
    pub mode: PlaybackMode,
    /// Segment painted active in both tracks
    pub highlighted: Option<SegmentIndex>,
    /// Segment the user clicked last; survives hovering
    pub last_clicked: Option<SegmentIndex>,
}

impl PlaybackSession {
    pub fn is_idle(&self) -> bool {
        self.mode == PlaybackMode::Idle
    }

    /// Index a hover should fall back to: the clicked segment, else the one
    /// playback last highlighted
    pub fn committed(&self) -> Option<SegmentIndex> {
        self.last_clicked.or(self.highlighted)
    }

    /// Drops both highlight markers
    pub fn clear_highlights(&mut self) {
        self.highlighted = None;
        self.last_clicked = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_committed_prefers_click() {
        let mut session = PlaybackSession {
            highlighted: Some(4),
            ..PlaybackSession::default()
        };
        assert_eq!(session.committed(), Some(4));

        session.last_clicked = Some(2);
        assert_eq!(session.committed(), Some(2));

        session.clear_highlights();
        assert_eq!(session.committed(), None);
        assert!(session.is_idle());
    }
}
