//! Psalmody Core Library
//!
//! Bilingual (English/Portuguese) scripture reading engine.
//! This library parses per-verse captions, discovers a lesson's verses,
//! builds aligned timelines and keeps highlighted text in step with narration.
//!
//! The embedding application supplies three collaborators: a
//! [`core::resources::ResourceFetcher`], a [`core::playback::AudioOutput`] and a
//! [`core::highlight::RenderSurface`]. Everything else lives in
//! [`core::reader::Reader`].

pub mod core;

use std::path::Path;
use std::sync::OnceLock;

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Log file name prefix inside the log directory
pub const LOG_FILE_NAME: &str = "psalmody.log";

/// Console stream for log output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStream {
    Stdout,
    /// For hosts whose stdout carries program output
    Stderr,
}

/// Installs the global tracing subscriber with stdout logging at `info`.
///
/// See [`init_logging_to`].
pub fn init_logging(log_dir: Option<&Path>) {
    init_logging_to(log_dir, ConsoleStream::Stdout, "info");
}

/// Installs the global tracing subscriber.
///
/// Logs go to `console` and, when `log_dir` is given, to a daily rolling file
/// (best effort). `RUST_LOG` overrides `default_level`. Calling this more than
/// once is harmless.
pub fn init_logging_to(log_dir: Option<&Path>, console: ConsoleStream, default_level: &str) {
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let console_writer = match console {
        ConsoleStream::Stdout => BoxMakeWriter::new(std::io::stdout),
        ConsoleStream::Stderr => BoxMakeWriter::new(std::io::stderr),
    };
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(console_writer)
        .with_ansi(cfg!(debug_assertions));

    let file_layer = log_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);

    // Already initialized (tests, embedding hosts).
    let _ = tracing::subscriber::set_global_default(subscriber);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_logging_is_repeatable() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("logs");

        init_logging(Some(&log_dir));
        init_logging(None);
        init_logging_to(Some(&log_dir), ConsoleStream::Stderr, "warn");

        assert!(log_dir.is_dir());
    }
}
