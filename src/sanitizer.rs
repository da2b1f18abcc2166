/*!
 * Transcript cleaning: advertisement removal and blank-line normalization.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use log::debug;

use crate::subtitle_processor::CueDocument;

// @const: Advertisement marker through the end of its line
static ADVERTISEMENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\[advertisement\].*?(?:\n|$)").unwrap());

// @const: Three or more line breaks
static BLANK_RUN_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Remove advertisement runs and collapse long blank-line runs
///
/// Removal repeats until no marker is left, since text joined around a
/// removed run can spell a new marker.
pub fn sanitize(text: &str) -> String {
    let mut without_ads = text.to_string();
    while ADVERTISEMENT_REGEX.is_match(&without_ads) {
        without_ads = ADVERTISEMENT_REGEX.replace_all(&without_ads, "").into_owned();
    }
    BLANK_RUN_REGEX.replace_all(&without_ads, "\n\n").into_owned()
}

/// Remove advertisement lines from cue bodies, dropping cues left empty
///
/// Works on whole cues so that index and timing lines are never orphaned.
pub fn sanitize_cues(document: &CueDocument) -> CueDocument {
    let mut cleaned = document.clone();
    let before = cleaned.cues.len();

    cleaned.cues = document
        .cues
        .iter()
        .filter_map(|cue| {
            let lines: Vec<String> = cue
                .lines
                .iter()
                .filter(|line| !ADVERTISEMENT_REGEX.is_match(line))
                .cloned()
                .collect();
            if lines.is_empty() {
                None
            } else {
                let mut kept = cue.clone();
                kept.lines = lines;
                Some(kept)
            }
        })
        .collect();

    let removed = before - cleaned.cues.len();
    if removed > 0 {
        debug!("Removed {} advertisement cue(s)", removed);
    }

    cleaned
}
