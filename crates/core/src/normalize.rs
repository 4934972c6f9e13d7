use crate::error::IngestError;
use regex::Regex;

/// Canonicalises extracted text before segmentation.
///
/// Line endings become `\n`, runs of blank lines collapse to one paragraph
/// break, runs of spaces and tabs collapse to one space, and the result is
/// trimmed. Applying it twice gives the same output as applying it once.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    line_endings: Regex,
    blank_lines: Regex,
    horizontal_space: Regex,
}

impl TextNormalizer {
    pub fn new() -> Result<Self, IngestError> {
        Ok(Self {
            line_endings: Regex::new(r"\r\n?")?,
            blank_lines: Regex::new(r"\n{2,}")?,
            horizontal_space: Regex::new(r"[ \t]{2,}")?,
        })
    }

    pub fn normalize(&self, text: &str) -> String {
        let unified = self.line_endings.replace_all(text, "\n");
        let paragraphs = self.blank_lines.replace_all(&unified, "\n\n");
        let spaced = self.horizontal_space.replace_all(&paragraphs, " ");
        spaced.trim().to_string()
    }
}
