//! Timeline Module
//!
//! Per-language segment timelines with explicit absolute indices, and the
//! builder that assembles them from verse caption files.

mod builder;
mod models;

pub use builder::TimelineBuilder;
pub use models::{Timeline, Timelines, VerseSpan};
