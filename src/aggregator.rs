/*!
 * Aggregation of per-item documents into the final deliverable.
 *
 * Combined output concatenates every document under a title separator with
 * one global cue numbering. Separate output becomes one archive entry per
 * item with unique, sanitized names.
 */

use std::collections::HashSet;

use log::debug;

use crate::archive::ArchiveEntry;
use crate::codec::OutputFormat;
use crate::errors::CodecError;
use crate::file_utils::FileManager;
use crate::subtitle_processor::CueDocument;

/// One item's document after sanitizing and rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub title: String,
    /// Catalog code of the track the document came from
    pub language: String,
    /// Text in the target format
    pub content: String,
}

/// Separator line placed before each item in a combined document
pub fn separator(title: &str, format: OutputFormat) -> String {
    if format.is_markup() {
        format!("\n\n=== {} ===\n\n", title)
    } else {
        format!("\n\n### {} ###\n\n", title)
    }
}

/// Concatenate documents into one, renumbering markup cues globally
///
/// A combined WebVTT document carries a single banner at the top.
pub fn combine(documents: &[RenderedDocument], format: OutputFormat) -> Result<String, CodecError> {
    let mut out = String::new();
    if format == OutputFormat::Vtt {
        out.push_str("WEBVTT\n");
    }

    let mut next_index = 1;
    for document in documents {
        out.push_str(&separator(&document.title, format));

        if format.is_markup() {
            let parsed = CueDocument::parse(&document.content, format.dialect())?;
            let (body, next) = parsed.serialize_from(format.dialect(), next_index);
            out.push_str(&body);
            next_index = next;
        } else {
            out.push_str(&document.content);
        }
    }

    debug!(
        "Combined {} document(s), {} cue(s)",
        documents.len(),
        next_index.saturating_sub(1)
    );
    Ok(out)
}

/// One archive entry per document, named `{title}.{ext}` without collisions
pub fn separate(documents: &[RenderedDocument], format: OutputFormat, max_chars: usize) -> Vec<ArchiveEntry> {
    let mut taken = HashSet::new();

    documents
        .iter()
        .map(|document| {
            let stem = FileManager::sanitize_filename(&document.title, max_chars);
            let name = unique_name(&stem, format.extension(), &mut taken);
            ArchiveEntry {
                name,
                content: document.content.clone(),
            }
        })
        .collect()
}

fn unique_name(stem: &str, extension: &str, taken: &mut HashSet<String>) -> String {
    let mut candidate = format!("{}.{}", stem, extension);
    let mut counter = 2;
    while !taken.insert(candidate.to_lowercase()) {
        candidate = format!("{} ({}).{}", stem, counter, extension);
        counter += 1;
    }
    candidate
}

/// `{title}_combined.{ext}`
pub fn combined_filename(batch_title: &str, format: OutputFormat, max_chars: usize) -> String {
    format!(
        "{}_combined.{}",
        FileManager::sanitize_filename(batch_title, max_chars),
        format.extension()
    )
}

/// `{title}_subtitles.zip`
pub fn archive_filename(batch_title: &str, max_chars: usize) -> String {
    format!("{}_subtitles.zip", FileManager::sanitize_filename(batch_title, max_chars))
}

/// `{title}.{language}.{ext}`
pub fn single_filename(title: &str, language: &str, format: OutputFormat, max_chars: usize) -> String {
    format!(
        "{}.{}.{}",
        FileManager::sanitize_filename(title, max_chars),
        language,
        format.extension()
    )
}
