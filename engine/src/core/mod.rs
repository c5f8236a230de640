//! Psalmody Core Engine
//!
//! Bilingual reading engine.
//! Handles caption parsing, verse discovery, timeline building, narration and
//! highlight synchronization for one lesson at a time.

pub mod captions;
pub mod fs;
pub mod highlight;
pub mod navigator;
pub mod playback;
pub mod reader;
pub mod resources;
pub mod settings;
pub mod timeline;
pub mod verses;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
