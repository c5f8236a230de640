//! Psalmody Error Definitions
//!
//! Defines error types used throughout the engine. None of these are fatal to a
//! reading session: callers absorb them as "absent, skip and continue".

use thiserror::Error;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Resource Errors
    // =========================================================================
    #[error("Resource unavailable: {url} ({reason})")]
    ResourceUnavailable { url: String, reason: String },

    #[error("Resource timed out after {timeout_ms}ms: {url}")]
    ResourceTimeout { url: String, timeout_ms: u64 },

    // =========================================================================
    // Playback Errors
    // =========================================================================
    #[error("Playback failed for {url}: {reason}")]
    PlaybackFailure { url: String, reason: String },

    // =========================================================================
    // Lesson Content Errors
    // =========================================================================
    #[error("Verse configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Malformed caption block {block}: {reason}")]
    MalformedCaption { block: usize, reason: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Shorthand for an unavailable resource
    pub fn unavailable(url: &str, reason: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error means "the resource is not there" (missing, failing
    /// or too slow) as opposed to a local fault
    pub fn is_absent(&self) -> bool {
        matches!(
            self,
            Self::ResourceUnavailable { .. } | Self::ResourceTimeout { .. }
        )
    }
}
