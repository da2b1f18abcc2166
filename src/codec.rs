/*!
 * Format conversion between caption dialects.
 *
 * Markup dialects (SRT and WebVTT) differ structurally only in the millisecond
 * separator of their timestamps. Plain text is the display dialect: no indices,
 * no timing, no inline tags. Converting to plain text is one-way and idempotent.
 */

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::subtitle_processor::{is_index_line, is_timing_line, Cue, CueDocument, Dialect};

// @const: Inline presentation tags stripped for plain text
static INLINE_TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[\d:.]+>").unwrap());
static VOICE_TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?v(?:[\s.][^>]*)?>").unwrap());
static CLASS_TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?c(?:[\s.][^>]*)?>").unwrap());
static STYLE_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(?:b|i|u|font|lang|ruby|rt)(?:[\s.][^>]*)?>").unwrap());

// @const: Timing line split into its two timestamps and trailing settings
static TIMING_PARTS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\S+)\s*-->\s*(\S+)(?:\s+(.*?))?\s*$").unwrap()
});

/// Target formats offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Srt,
    Vtt,
    Txt,
}

impl OutputFormat {
    // @returns: File extension without dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Srt => "srt",
            OutputFormat::Vtt => "vtt",
            OutputFormat::Txt => "txt",
        }
    }

    // @returns: MIME type used when handing the file to a browser
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Vtt => "text/vtt",
            OutputFormat::Srt | OutputFormat::Txt => "text/plain",
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            OutputFormat::Srt => Dialect::Srt,
            OutputFormat::Vtt => Dialect::Vtt,
            OutputFormat::Txt => Dialect::Plain,
        }
    }

    /// Whether the format keeps cue timing
    pub fn is_markup(&self) -> bool {
        self.dialect().is_markup()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "srt" => Ok(Self::Srt),
            "vtt" => Ok(Self::Vtt),
            "txt" => Ok(Self::Txt),
            _ => Err(anyhow!("Invalid output format: {}", s)),
        }
    }
}

/// Render a document into the requested output format
pub fn render(document: &CueDocument, format: OutputFormat) -> String {
    match format {
        OutputFormat::Srt => document.serialize(Dialect::Srt),
        OutputFormat::Vtt => document.serialize(Dialect::Vtt),
        OutputFormat::Txt => to_plain_text(&document.serialize(Dialect::Srt)),
    }
}

/// Convert raw caption text between dialects
///
/// Markup to markup rewrites timestamps only. Anything to plain text goes
/// through [`to_plain_text`]. Plain text cannot be lifted back to markup.
pub fn convert(raw: &str, from: Dialect, to: Dialect) -> Result<String> {
    match (from, to) {
        (_, Dialect::Plain) => Ok(to_plain_text(raw)),
        (Dialect::Plain, _) => Err(anyhow!(
            "Plain text has no timing and cannot be converted to {:?}",
            to
        )),
        (_, target) => Ok(convert_markup(raw, target)),
    }
}

/// Rewrite markup text for the target markup dialect, line by line
pub fn convert_markup(raw: &str, target: Dialect) -> String {
    let normalized = raw.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut out = String::with_capacity(normalized.len() + 8);

    for line in normalized.lines() {
        let trimmed = line.trim();
        if target == Dialect::Srt
            && (trimmed.starts_with("WEBVTT") || trimmed.starts_with("Kind:") || trimmed.starts_with("Language:"))
        {
            continue;
        }

        if is_timing_line(line) {
            out.push_str(&rewrite_timing_line(line, target));
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }

    match target {
        Dialect::Srt => out.trim_start_matches('\n').to_string(),
        _ if out.trim_start().starts_with("WEBVTT") => out,
        _ => format!("WEBVTT\n\n{}", out.trim_start_matches('\n')),
    }
}

/// Strip caption text down to its spoken words
///
/// Drops index and timing lines, inline timestamp/voice/class/style tags, bare
/// NOTE directives and banner lines. Each kept line ends with a newline and the
/// document ends with one blank line.
pub fn to_plain_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());

    for line in raw.lines() {
        let stripped = strip_inline_tags(line);
        let trimmed = stripped.trim();

        if trimmed.is_empty() || is_index_line(trimmed) || is_timing_line(trimmed) || is_structural_noise(trimmed) {
            continue;
        }

        out.push_str(trimmed);
        out.push('\n');
    }

    out.push('\n');
    out
}

/// Remove inline presentation markup from one line
pub fn strip_inline_tags(line: &str) -> String {
    let mut current = line.to_string();
    // Removal can expose a new tag; repeat until stable
    loop {
        let next = INLINE_TIMESTAMP_REGEX.replace_all(&current, "");
        let next = VOICE_TAG_REGEX.replace_all(&next, "");
        let next = CLASS_TAG_REGEX.replace_all(&next, "");
        let next = STYLE_TAG_REGEX.replace_all(&next, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn is_structural_noise(trimmed: &str) -> bool {
    trimmed == "NOTE"
        || trimmed.starts_with("WEBVTT")
        || trimmed.starts_with("Kind:")
        || trimmed.starts_with("Language:")
}

fn rewrite_timing_line(line: &str, target: Dialect) -> String {
    let Some(caps) = TIMING_PARTS_REGEX.captures(line) else {
        return line.to_string();
    };

    let start = caps.get(1).map_or("", |m| m.as_str());
    let end = caps.get(2).map_or("", |m| m.as_str());
    let (Ok(start_ms), Ok(end_ms)) = (Cue::parse_timestamp(start), Cue::parse_timestamp(end)) else {
        return line.to_string();
    };

    let mut rewritten = format!(
        "{} --> {}",
        Cue::format_timestamp(start_ms, target),
        Cue::format_timestamp(end_ms, target)
    );
    if target == Dialect::Vtt {
        if let Some(settings) = caps.get(3).filter(|m| !m.as_str().is_empty()) {
            rewritten.push(' ');
            rewritten.push_str(settings.as_str());
        }
    }
    rewritten
}
