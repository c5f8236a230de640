//! Caption Format Parser
//!
//! Parses the timed-caption block format used by the lesson subtitle files.
//!
//! # Format
//!
//! ```text
//! 1
//! 00:00:00,000 --> 00:00:02,480
//! *Blessed is the man {Bem-aventurado o homem}
//!
//! 2
//! 00:00:02:48 --> 00:00:05:10
//! that walketh not in the counsel
//! of the ungodly
//! ```
//!
//! Two timestamp flavours are accepted without configuration:
//! - `H:MM:SS,mmm` (comma, milliseconds)
//! - `H:MM:SS:ff` (four fields; two digits are centiseconds, otherwise milliseconds)
//!
//! Text markup:
//! - the last `{...}` run is the inline translation; every `{...}` run is
//!   removed from the display text
//! - a leading `*` opens a new verse and numbers the segment

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use super::Segment;
use crate::core::{CoreError, TimeSec, VerseNumber};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while parsing a single caption block
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Invalid timestamp format
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// Invalid caption format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    /// Missing required data
    #[error("Missing data: {0}")]
    MissingData(String),
}

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(.*?)\}").expect("markup pattern is valid"));

/// Marker that opens a new verse
const VERSE_MARKER: char = '*';

// =============================================================================
// Block Parsing
// =============================================================================

/// Parses caption content into segments.
///
/// `verse_hint` is the number assigned to the first verse marker found; each
/// further marker increments it, saturating at `VerseNumber::MAX`. Malformed
/// blocks are skipped.
pub fn parse_captions(content: &str, verse_hint: VerseNumber) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut next_verse = verse_hint;

    for (block_index, block) in split_blocks(content).iter().enumerate() {
        let cue = match parse_block(block) {
            Ok(cue) => cue,
            Err(e) => {
                debug!(block = block_index, "Skipping malformed caption block: {}", e);
                continue;
            }
        };

        let (text, translation) = split_markup(&cue.text);
        let segment = match text.strip_prefix(VERSE_MARKER) {
            Some(rest) => {
                let verse = next_verse;
                next_verse = next_verse.saturating_add(1);
                Segment {
                    start: cue.start,
                    end: cue.end,
                    main_text: rest.trim().to_string(),
                    translation,
                    verse_number: Some(verse),
                }
            }
            None => Segment {
                start: cue.start,
                end: cue.end,
                main_text: text,
                translation,
                verse_number: None,
            },
        };
        segments.push(segment);
    }

    segments
}

/// Reports every block `parse_captions` would skip, in block order
pub fn find_malformed_blocks(content: &str) -> Vec<CoreError> {
    split_blocks(content)
        .iter()
        .enumerate()
        .filter_map(|(block, lines)| parse_block(lines).err().map(|e| e.at_block(block)))
        .collect()
}

impl ParseError {
    /// Converts to the engine error, tagging the 0-based block index
    pub fn at_block(self, block: usize) -> CoreError {
        match self {
            Self::InvalidTimestamp(ts) => CoreError::InvalidTimestamp(ts),
            other => CoreError::MalformedCaption {
                block,
                reason: other.to_string(),
            },
        }
    }
}

/// A timed block before markup handling
#[derive(Debug, Clone, PartialEq)]
struct RawCue {
    start: TimeSec,
    end: TimeSec,
    text: String,
}

/// Groups non-blank lines into blocks separated by blank lines
fn split_blocks(content: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

/// Parses one block: an optional cue number, the timing line, then text lines
fn parse_block(lines: &[&str]) -> Result<RawCue, ParseError> {
    let (timing_line, text_lines) = match lines {
        [first, rest @ ..] if first.contains("-->") => (*first, rest),
        [_, timing, rest @ ..] => (*timing, rest),
        _ => return Err(ParseError::MissingData("timing line".to_string())),
    };

    if text_lines.is_empty() {
        return Err(ParseError::MissingData("caption text".to_string()));
    }

    let (start, end) = parse_timing_line(timing_line)?;
    if end <= start {
        return Err(ParseError::InvalidFormat(format!(
            "end {} is not after start {}",
            end, start
        )));
    }

    let text = text_lines
        .iter()
        .map(|l| l.trim())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(RawCue { start, end, text })
}

/// Parses a timing line (e.g., "00:00:01,000 --> 00:00:04,000")
fn parse_timing_line(line: &str) -> Result<(TimeSec, TimeSec), ParseError> {
    let parts: Vec<&str> = line.split("-->").collect();
    if parts.len() != 2 {
        return Err(ParseError::InvalidFormat(format!(
            "Expected 'start --> end' format: {}",
            line
        )));
    }

    let end_part = parts[1].trim();
    let end_str = end_part.split_whitespace().next().unwrap_or(end_part);

    let start = parse_timestamp(parts[0])?;
    let end = parse_timestamp(end_str)?;

    Ok((start, end))
}

// =============================================================================
// Timestamps
// =============================================================================

/// Parses a caption timestamp into seconds.
///
/// Accepts `H:MM:SS,mmm` and `H:MM:SS:ff` (centiseconds when the last field has
/// two digits, milliseconds otherwise).
pub fn parse_timestamp(ts: &str) -> Result<TimeSec, ParseError> {
    let ts = ts.trim();

    if let Some((clock, millis)) = ts.split_once(',') {
        let fields: Vec<&str> = clock.split(':').collect();
        if fields.len() != 3 {
            return Err(ParseError::InvalidTimestamp(ts.to_string()));
        }
        let ms = parse_field(millis, ts)?;
        return Ok(clock_seconds(&fields, ts)? + f64::from(ms) / 1000.0);
    }

    let fields: Vec<&str> = ts.split(':').collect();
    if fields.len() == 4 {
        let sub = fields[3];
        let value = parse_field(sub, ts)?;
        let ms = if sub.len() == 2 { value * 10 } else { value };
        return Ok(clock_seconds(&fields[..3], ts)? + f64::from(ms) / 1000.0);
    }

    Err(ParseError::InvalidTimestamp(ts.to_string()))
}

fn clock_seconds(fields: &[&str], ts: &str) -> Result<TimeSec, ParseError> {
    let hours = parse_field(fields[0], ts)?;
    let minutes = parse_field(fields[1], ts)?;
    let seconds = parse_field(fields[2], ts)?;
    Ok(f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + f64::from(seconds))
}

fn parse_field(field: &str, ts: &str) -> Result<u32, ParseError> {
    let field = field.trim();
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidTimestamp(ts.to_string()));
    }
    field
        .parse()
        .map_err(|_| ParseError::InvalidTimestamp(ts.to_string()))
}

// =============================================================================
// Markup
// =============================================================================

/// Splits caption text into display text and the inline translation
fn split_markup(text: &str) -> (String, String) {
    let translation = MARKUP
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    let stripped = MARKUP.replace_all(text, "");
    let main_text = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    (main_text, translation)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Timestamp Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_timestamp_comma_format() {
        assert_eq!(parse_timestamp("00:00:01,500").unwrap(), 1.5);
        assert_eq!(parse_timestamp("00:01:02,000").unwrap(), 62.0);
        assert_eq!(parse_timestamp("01:30:00,000").unwrap(), 5400.0);
        assert_eq!(parse_timestamp("00:00:00,100").unwrap(), 0.1);
    }

    #[test]
    fn test_parse_timestamp_colon_format() {
        // Two digits: centiseconds
        assert_eq!(parse_timestamp("00:00:01:50").unwrap(), 1.5);
        // Three digits: milliseconds
        assert_eq!(parse_timestamp("00:00:01:500").unwrap(), 1.5);
        assert_eq!(parse_timestamp("0:01:02:00").unwrap(), 62.0);
    }

    #[test]
    fn test_parse_timestamp_rejects_other_shapes() {
        assert!(matches!(
            parse_timestamp("00:00:01.500"),
            Err(ParseError::InvalidTimestamp(_))
        ));
        assert!(parse_timestamp("00:01,500").is_err());
        assert!(parse_timestamp("00:00:xx,000").is_err());
        assert!(parse_timestamp("").is_err());
    }

    // -------------------------------------------------------------------------
    // Block Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_basic_blocks() {
        let srt = "1\n00:00:00,000 --> 00:00:02,000\nBlessed is the man\n\n2\n00:00:02,000 --> 00:00:04,500\nthat walketh not\nin the counsel\n";

        let segments = parse_captions(srt, 1);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 2.0);
        assert_eq!(segments[0].main_text, "Blessed is the man");
        assert_eq!(segments[1].main_text, "that walketh not in the counsel");
        assert_eq!(segments[1].end, 4.5);
        assert!(segments.iter().all(|s| s.verse_number.is_none()));
    }

    #[test]
    fn test_markup_is_stripped_and_translation_extracted() {
        let srt = "1\n00:00:00,000 --> 00:00:02,000\nBlessed {note} is the man {Bem-aventurado o homem}\n";

        let segments = parse_captions(srt, 1);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].main_text, "Blessed is the man");
        assert_eq!(segments[0].translation, "Bem-aventurado o homem");
        assert!(!segments[0].main_text.contains('{'));
        assert!(segments[0].start < segments[0].end);
    }

    #[test]
    fn test_verse_numbering_starts_at_hint() {
        let srt = "1\n00:00:00,000 --> 00:00:01,000\n*The LORD is my shepherd\n\n\
                   2\n00:00:01,000 --> 00:00:02,000\nI shall not want\n\n\
                   3\n00:00:02,000 --> 00:00:03,000\n* He maketh me to lie down\n";

        let segments = parse_captions(srt, 3);
        assert_eq!(segments[0].verse_number, Some(3));
        assert_eq!(segments[0].main_text, "The LORD is my shepherd");
        assert_eq!(segments[1].verse_number, None);
        assert_eq!(segments[2].verse_number, Some(4));
        assert_eq!(segments[2].main_text, "He maketh me to lie down");
    }

    #[test]
    fn test_verse_numbering_saturates_at_max_hint() {
        let srt = "1\n00:00:00,000 --> 00:00:01,000\n*First\n\n\
                   2\n00:00:01,000 --> 00:00:02,000\n*Second\n\n\
                   3\n00:00:02,000 --> 00:00:03,000\n*Third\n";

        let segments = parse_captions(srt, VerseNumber::MAX);
        assert_eq!(segments.len(), 3);
        assert!(segments
            .iter()
            .all(|s| s.verse_number == Some(VerseNumber::MAX)));
    }

    #[test]
    fn test_malformed_blocks_are_skipped() {
        let srt = "1\n00:00:00,000 --> 00:00:01,000\nFirst\n\n\
                   2\nnot a timing line\nBroken\n\n\
                   3\n00:00:02,000 --> 00:00:01,000\nBackwards\n\n\
                   4\n00:00:03,000 --> 00:00:04,000\n\n\
                   5\n00:00:05,000 --> 00:00:06,000\nLast\n";

        let segments = parse_captions(srt, 1);
        let texts: Vec<&str> = segments.iter().map(|s| s.main_text.as_str()).collect();
        assert_eq!(texts, vec!["First", "Last"]);

        let report = find_malformed_blocks(srt);
        assert_eq!(report.len(), 3);
        assert!(matches!(report[0], CoreError::MalformedCaption { block: 1, .. }));
        assert!(matches!(report[1], CoreError::MalformedCaption { block: 2, .. }));
        assert!(matches!(report[2], CoreError::MalformedCaption { block: 3, .. }));
    }

    #[test]
    fn test_bad_timestamp_is_reported() {
        let srt = "1\n00:00:01.000 --> 00:00:02,000\nDotted\n";

        assert!(parse_captions(srt, 1).is_empty());
        let report = find_malformed_blocks(srt);
        assert!(matches!(&report[..], [CoreError::InvalidTimestamp(ts)] if ts == "00:00:01.000"));
    }

    #[test]
    fn test_crlf_and_extra_blank_lines() {
        let srt = "1\r\n00:00:00,000 --> 00:00:01,000\r\nOne\r\n\r\n\r\n\r\n2\r\n00:00:01:00 --> 00:00:02:50\r\nTwo\r\n";

        let segments = parse_captions(srt, 1);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].main_text, "Two");
        assert_eq!(segments[1].end, 2.5);
    }

    #[test]
    fn test_block_without_cue_number() {
        let srt = "00:00:00,000 --> 00:00:01,000\nNo number here\n";

        let segments = parse_captions(srt, 1);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].main_text, "No number here");
    }

    #[test]
    fn test_empty_content() {
        assert!(parse_captions("", 1).is_empty());
        assert!(parse_captions("\n\n  \n", 1).is_empty());
    }
}
