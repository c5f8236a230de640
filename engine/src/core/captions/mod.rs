//! Caption Module
//!
//! Turns timed-caption resources into verse-aware segments:
//! - Segment model
//! - Caption parsing (comma and frame-style timestamps, translation and verse markup)
//! - Cached loading through the resource fetcher
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Captions                                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  models.rs     - Segment                                         │
//! │  formats.rs    - Caption block parsing, timestamps, markup       │
//! │  loader.rs     - Fetch + memory/persistent caching               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use crate::core::captions::parse_captions;
//!
//! let content = "1\n00:00:00,000 --> 00:00:02,500\n*Blessed is the man {Bem-aventurado o homem}\n";
//! let segments = parse_captions(content, 1);
//! assert_eq!(segments[0].verse_number, Some(1));
//! assert_eq!(segments[0].translation, "Bem-aventurado o homem");
//! ```

mod formats;
mod loader;
mod models;

pub use formats::{find_malformed_blocks, parse_captions, parse_timestamp, ParseError};
pub use loader::CaptionLoader;
pub use models::Segment;
