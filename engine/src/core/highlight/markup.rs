//! Display Markup
//!
//! Segment text may carry light formatting:
//! - `//...` at the end is an editor comment and is not shown
//! - the first `/` breaks the text into two lines
//! - a second line starting with `#` is shown bold
//! - a trailing `#` on a container's first segment asks for extra space below it

use serde::{Deserialize, Serialize};

/// Segment text ready for display
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedText {
    pub first_line: String,
    pub second_line: Option<String>,
    pub second_line_bold: bool,
    pub extra_spacing: bool,
}

impl RenderedText {
    /// Text with the line break rendered as a newline
    pub fn plain(&self) -> String {
        match &self.second_line {
            Some(second) => format!("{}\n{}", self.first_line, second),
            None => self.first_line.clone(),
        }
    }
}

/// Applies display markup to a segment's text
pub fn render_text(main_text: &str, first_in_container: bool) -> RenderedText {
    let without_comment = match main_text.find("//") {
        Some(pos) => &main_text[..pos],
        None => main_text,
    };

    let mut rendered = match without_comment.split_once('/') {
        Some((first, second)) => {
            let second = second.trim();
            let (second, bold) = match second.strip_prefix('#') {
                Some(rest) => (rest.trim(), true),
                None => (second, false),
            };
            RenderedText {
                first_line: first.trim().to_string(),
                second_line: Some(second.to_string()),
                second_line_bold: bold,
                extra_spacing: false,
            }
        }
        None => RenderedText {
            first_line: without_comment.trim().to_string(),
            ..RenderedText::default()
        },
    };

    if first_in_container {
        let last_line = match rendered.second_line.as_mut() {
            Some(second) => second,
            None => &mut rendered.first_line,
        };
        if let Some(stripped) = last_line.strip_suffix('#') {
            *last_line = stripped.trim_end().to_string();
            rendered.extra_spacing = true;
        }
    }

    rendered
}
