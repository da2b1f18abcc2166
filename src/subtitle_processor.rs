use std::fmt;
use regex::Regex;
use once_cell::sync::Lazy;
use log::{warn, debug};
use serde::{Deserialize, Serialize};

use crate::errors::CodecError;

// @module: Cue document model, parsing and serialisation

// @const: One timestamp, long (HH:MM:SS.mmm) or short WebVTT (MM:SS.mmm) form, either separator
const TIMESTAMP_PATTERN: &str = r"(?:(\d{1,3}):)?(\d{2}):(\d{2})[,.](\d{3})";

// @const: Cue timing line with optional WebVTT cue settings
static TIMING_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\s*{TIMESTAMP_PATTERN}\s*-->\s*{TIMESTAMP_PATTERN}(?:\s+(.*?))?\s*$"
    ))
    .unwrap()
});

// @const: Bare numeric index line
static INDEX_LINE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

/// Caption text dialects understood by the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// SubRip: comma millisecond separator, numeric indices
    Srt,
    /// WebVTT: period millisecond separator, banner line
    Vtt,
    /// Plain text without timing
    Plain,
}

impl Dialect {
    // @returns: Millisecond separator used in timing lines
    pub fn millis_separator(&self) -> char {
        match self {
            Dialect::Vtt => '.',
            _ => ',',
        }
    }

    /// Whether the dialect carries timing information
    pub fn is_markup(&self) -> bool {
        !matches!(self, Dialect::Plain)
    }

    /// Guess the dialect of raw caption text
    pub fn detect(raw: &str) -> Dialect {
        let trimmed = raw.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with("WEBVTT") {
            return Dialect::Vtt;
        }

        match trimmed.lines().find_map(|line| TIMING_LINE_REGEX.captures(line)) {
            Some(caps) => {
                let line = caps.get(0).map_or("", |m| m.as_str());
                if line.contains(',') { Dialect::Srt } else { Dialect::Vtt }
            }
            None => Dialect::Plain,
        }
    }
}

/// Start/end pair of a timed cue, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CueTiming {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl CueTiming {
    /// Creates a timing, clamping an end that precedes the start
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        CueTiming {
            start_ms,
            end_ms: end_ms.max(start_ms),
        }
    }
}

// @struct: One caption unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    // @field: Position in the source; regenerated on output
    pub index: usize,

    // @field: Timing, absent for plain text
    pub timing: Option<CueTiming>,

    // @field: WebVTT cue settings trailing the timing line
    pub settings: Option<String>,

    // @field: Body lines, possibly with inline markup
    pub lines: Vec<String>,
}

impl Cue {
    /// Creates a timed cue
    pub fn timed(index: usize, start_ms: u64, end_ms: u64, lines: Vec<String>) -> Self {
        Cue {
            index,
            timing: Some(CueTiming::new(start_ms, end_ms)),
            settings: None,
            lines,
        }
    }

    /// Creates an untimed cue
    pub fn untimed(index: usize, lines: Vec<String>) -> Self {
        Cue {
            index,
            timing: None,
            settings: None,
            lines,
        }
    }

    /// Body text with lines joined by newlines
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Parse a timestamp in either dialect to milliseconds
    pub fn parse_timestamp(timestamp: &str) -> Result<u64, CodecError> {
        static SINGLE: Lazy<Regex> =
            Lazy::new(|| Regex::new(&format!(r"^\s*{TIMESTAMP_PATTERN}\s*$")).unwrap());

        let caps = SINGLE
            .captures(timestamp)
            .ok_or_else(|| CodecError::MalformedInput(format!("Invalid timestamp: {}", timestamp)))?;
        Self::captures_to_ms(&caps, 1).ok_or_else(|| {
            CodecError::MalformedInput(format!("Invalid time components in timestamp: {}", timestamp))
        })
    }

    /// Format milliseconds as HH:MM:SS{sep}mmm for the dialect
    pub fn format_timestamp(ms: u64, dialect: Dialect) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!(
            "{:02}:{:02}:{:02}{}{:03}",
            hours,
            minutes,
            seconds,
            dialect.millis_separator(),
            millis
        )
    }

    // Reads four capture groups (hours optional) starting at `start_idx`
    fn captures_to_ms(caps: &regex::Captures, start_idx: usize) -> Option<u64> {
        let part = |offset: usize| -> Option<u64> {
            caps.get(start_idx + offset).map(|m| m.as_str().parse().ok()).unwrap_or(Some(0))
        };
        let hours = part(0)?;
        let minutes = part(1)?;
        let seconds = part(2)?;
        let millis = part(3)?;

        if minutes >= 60 || seconds >= 60 {
            return None;
        }

        Some((hours * 3600 + minutes * 60 + seconds) * 1000 + millis)
    }
}

/// A caption track held in memory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CueDocument {
    /// Cues in presentation order
    pub cues: Vec<Cue>,

    /// Language tag of the track, when known
    pub language: Option<String>,

    /// Whether the track came from speech recognition
    pub is_auto_generated: bool,
}

impl CueDocument {
    /// Create a document from cues
    pub fn new(cues: Vec<Cue>) -> Self {
        CueDocument {
            cues,
            language: None,
            is_auto_generated: false,
        }
    }

    /// Attach track metadata, consuming the document
    pub fn with_metadata(mut self, language: Option<String>, is_auto_generated: bool) -> Self {
        self.language = language;
        self.is_auto_generated = is_auto_generated;
        self
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Parse raw caption text in the given dialect
    ///
    /// Framing (banner, `Kind:`/`Language:` lines, NOTE/STYLE/REGION blocks) is
    /// discarded, blocks that cannot be read are skipped, and indices are
    /// synthesized. Fails only when no cue block at all can be recovered.
    pub fn parse(raw: &str, dialect: Dialect) -> Result<Self, CodecError> {
        let normalized = raw.trim_start_matches('\u{feff}').replace("\r\n", "\n").replace('\r', "\n");
        let blocks = split_blocks(&normalized);

        if blocks.is_empty() {
            return Err(CodecError::MalformedInput("input contains no text".to_string()));
        }

        let mut cues = Vec::with_capacity(blocks.len());
        let mut skipped = 0;

        for block in blocks {
            let block = strip_framing(block);
            if block.is_empty() {
                continue;
            }

            let parsed = match dialect {
                Dialect::Plain => parse_plain_block(&block),
                Dialect::Srt | Dialect::Vtt => parse_markup_block(&block),
            };

            match parsed {
                Some(cue) => cues.push(cue),
                None => {
                    skipped += 1;
                    debug!("Skipping unparseable cue block: {:?}", block.first());
                }
            }
        }

        if cues.is_empty() {
            return Err(CodecError::MalformedInput(format!(
                "no cue blocks could be parsed ({} block(s) skipped)",
                skipped
            )));
        }

        if skipped > 0 {
            warn!("Skipped {} malformed cue block(s)", skipped);
        }

        // Stable sort keeps source order among equal start times
        if dialect.is_markup() {
            cues.sort_by_key(|cue| cue.timing.map_or(0, |t| t.start_ms));
        }

        for (i, cue) in cues.iter_mut().enumerate() {
            cue.index = i + 1;
        }

        Ok(CueDocument::new(cues))
    }

    /// Serialize to the given dialect with indices 1..N
    pub fn serialize(&self, dialect: Dialect) -> String {
        match dialect {
            Dialect::Vtt => {
                let (body, _) = self.serialize_from(dialect, 1);
                format!("WEBVTT\n\n{}", body)
            }
            Dialect::Srt => self.serialize_from(dialect, 1).0,
            Dialect::Plain => crate::codec::to_plain_text(&self.serialize_from(Dialect::Srt, 1).0),
        }
    }

    /// Serialize cue blocks only (no banner), numbering from `first_index`
    ///
    /// Returns the text and the next free index.
    pub fn serialize_from(&self, dialect: Dialect, first_index: usize) -> (String, usize) {
        let mut out = String::new();
        let mut index = first_index;

        for cue in &self.cues {
            match (dialect, cue.timing) {
                (Dialect::Plain, _) | (_, None) => {
                    out.push_str(&cue.text());
                    out.push_str("\n\n");
                }
                (_, Some(timing)) => {
                    out.push_str(&format!("{}\n", index));
                    out.push_str(&Cue::format_timestamp(timing.start_ms, dialect));
                    out.push_str(" --> ");
                    out.push_str(&Cue::format_timestamp(timing.end_ms, dialect));
                    if let (Dialect::Vtt, Some(settings)) = (dialect, &cue.settings) {
                        out.push(' ');
                        out.push_str(settings);
                    }
                    out.push('\n');
                    out.push_str(&cue.text());
                    out.push_str("\n\n");
                    index += 1;
                }
            }
        }

        (out, index)
    }
}

impl fmt::Display for CueDocument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Cue Document")?;
        writeln!(f, "Language: {}", self.language.as_deref().unwrap_or("unknown"))?;
        writeln!(f, "Auto-generated: {}", self.is_auto_generated)?;
        writeln!(f, "Cues: {}", self.cues.len())?;
        Ok(())
    }
}

/// Whether a line is a cue timing line
pub fn is_timing_line(line: &str) -> bool {
    TIMING_LINE_REGEX.is_match(line)
}

/// Whether a line is a bare numeric index
pub fn is_index_line(line: &str) -> bool {
    INDEX_LINE_REGEX.is_match(line.trim())
}

// Splits on blank lines into non-empty blocks of lines
fn split_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in text.lines() {
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

// Drops banner and metadata lines; NOTE/STYLE/REGION blocks vanish entirely
fn strip_framing(block: Vec<&str>) -> Vec<&str> {
    if let Some(first) = block.first() {
        let first = first.trim();
        if first == "NOTE" || first.starts_with("NOTE ") || first == "STYLE" || first == "REGION" {
            return Vec::new();
        }
    }

    block
        .into_iter()
        .filter(|line| {
            let trimmed = line.trim();
            !(trimmed.starts_with("WEBVTT") || trimmed.starts_with("Kind:") || trimmed.starts_with("Language:"))
        })
        .collect()
}

fn parse_plain_block(block: &[&str]) -> Option<Cue> {
    let lines: Vec<String> = block.iter().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect();
    if lines.is_empty() {
        return None;
    }
    Some(Cue::untimed(0, lines))
}

fn parse_markup_block(block: &[&str]) -> Option<Cue> {
    // Index or WebVTT cue identifier lines precede the timing line
    let timing_pos = block.iter().position(|line| TIMING_LINE_REGEX.is_match(line))?;
    if timing_pos > 1 {
        return None;
    }

    let caps = TIMING_LINE_REGEX.captures(block[timing_pos])?;
    let start_ms = Cue::captures_to_ms(&caps, 1)?;
    let end_ms = Cue::captures_to_ms(&caps, 5)?;
    let settings = caps
        .get(9)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());

    let lines: Vec<String> = block[timing_pos + 1..]
        .iter()
        .map(|l| l.trim_end().to_string())
        .filter(|l| !l.trim().is_empty())
        .collect();

    if lines.is_empty() {
        return None;
    }

    let mut cue = Cue::timed(0, start_ms, end_ms, lines);
    cue.settings = settings;
    Some(cue)
}
