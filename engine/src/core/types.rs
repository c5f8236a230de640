//! Psalmody Core Type Definitions
//!
//! Defines fundamental types used throughout the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::CoreError;

// =============================================================================
// ID Types
// =============================================================================

/// Lesson identifier as it appears in resource paths (e.g. "23")
pub type LessonId = String;

/// Verse number inside a lesson (1-based)
pub type VerseNumber = u32;

/// Absolute segment index inside a lesson timeline (0-based)
pub type SegmentIndex = usize;

/// Audio handle identifier, unique per controller
pub type HandleId = u64;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

// =============================================================================
// Language
// =============================================================================

/// Language track of a lesson
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "pt")]
    Portuguese,
}

impl Language {
    /// Both tracks, in rendering order
    pub const ALL: [Language; 2] = [Language::English, Language::Portuguese];

    /// Short code used in resource names
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Portuguese => "pt",
        }
    }

    /// The paired track
    pub fn other(&self) -> Self {
        match self {
            Self::English => Self::Portuguese,
            Self::Portuguese => Self::English,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::English),
            "pt" | "portuguese" => Ok(Self::Portuguese),
            other => Err(CoreError::ValidationError(format!(
                "Unknown language: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Display Mode
// =============================================================================

/// Layout the reader is showing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// All verses in one continuous view
    #[default]
    Horizontal,
    /// One verse per page with navigation
    Vertical,
}

impl DisplayMode {
    /// The other layout
    pub fn toggled(&self) -> Self {
        match self {
            Self::Horizontal => Self::Vertical,
            Self::Vertical => Self::Horizontal,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::English.code(), "en");
        assert_eq!(Language::Portuguese.code(), "pt");
        assert_eq!(Language::English.other(), Language::Portuguese);
        assert_eq!(Language::Portuguese.to_string(), "pt");
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::English);
        assert_eq!("portuguese".parse::<Language>().unwrap(), Language::Portuguese);
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_language_serde_uses_codes() {
        let json = serde_json::to_string(&Language::Portuguese).unwrap();
        assert_eq!(json, "\"pt\"");
        let parsed: Language = serde_json::from_str("\"en\"").unwrap();
        assert_eq!(parsed, Language::English);
    }

    #[test]
    fn test_display_mode_toggle() {
        assert_eq!(DisplayMode::default(), DisplayMode::Horizontal);
        assert_eq!(DisplayMode::Horizontal.toggled(), DisplayMode::Vertical);
        assert_eq!(DisplayMode::Vertical.toggled(), DisplayMode::Horizontal);
    }
}
