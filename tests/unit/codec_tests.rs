/*!
 * Tests for format conversion
 */

use anyhow::Result;
use subgrab::codec::{self, OutputFormat};
use subgrab::subtitle_processor::{CueDocument, Dialect};
use crate::common;

/// Test SRT to VTT conversion
#[test]
fn test_convert_withSrtToVtt_shouldRewriteTimestampsAndAddBanner() -> Result<()> {
    let out = codec::convert(common::SAMPLE_SRT, Dialect::Srt, Dialect::Vtt)?;

    assert!(out.starts_with("WEBVTT\n\n"));
    assert!(out.contains("00:00:05.000 --> 00:00:09.000"));
    assert!(!out.contains(','));
    assert!(out.contains("It contains multiple entries."));
    Ok(())
}

/// Test VTT to SRT conversion
#[test]
fn test_convert_withVttToSrt_shouldDropBannerAndSettings() -> Result<()> {
    let out = codec::convert(common::SAMPLE_VTT, Dialect::Vtt, Dialect::Srt)?;

    assert!(!out.contains("WEBVTT"));
    assert!(!out.contains("Kind:"));
    assert!(out.contains("00:00:02,500 --> 00:00:05,000\n"));
    assert!(!out.contains("align:start"));
    Ok(())
}

/// Test that markup to markup keeps the cue count
#[test]
fn test_convert_roundTrip_shouldPreserveCues() -> Result<()> {
    let vtt = codec::convert(common::SAMPLE_SRT, Dialect::Srt, Dialect::Vtt)?;
    let srt = codec::convert(&vtt, Dialect::Vtt, Dialect::Srt)?;

    let original = CueDocument::parse(common::SAMPLE_SRT, Dialect::Srt)?;
    let back = CueDocument::parse(&srt, Dialect::Srt)?;
    assert_eq!(original.cues, back.cues);
    Ok(())
}

/// Test plain text output
#[test]
fn test_toPlainText_withKaraokeVtt_shouldKeepOnlyWords() {
    let out = codec::to_plain_text(common::SAMPLE_VTT);
    assert_eq!(out, "hello there\ngeneral kenobi\n\n");
}

/// Test plain text is idempotent
#[test]
fn test_toPlainText_appliedTwice_shouldNotChange() {
    let once = codec::to_plain_text(common::SAMPLE_SRT);
    let twice = codec::to_plain_text(&once);
    assert_eq!(once, twice);
}

/// Test plain text cannot become markup
#[test]
fn test_convert_fromPlain_shouldFail() {
    assert!(codec::convert("hello\n", Dialect::Plain, Dialect::Srt).is_err());
    assert!(codec::convert("hello\n", Dialect::Plain, Dialect::Plain).is_ok());
}

/// Test rendering a document to each format
#[test]
fn test_render_withEachFormat_shouldMatchDialect() -> Result<()> {
    let doc = CueDocument::parse(common::SAMPLE_SRT, Dialect::Srt)?;

    assert!(codec::render(&doc, OutputFormat::Srt).starts_with("1\n00:00:01,000"));
    assert!(codec::render(&doc, OutputFormat::Vtt).starts_with("WEBVTT\n\n1\n00:00:01.000"));
    assert_eq!(
        codec::render(&doc, OutputFormat::Txt),
        "This is a test subtitle.\nIt contains multiple entries.\nFor testing purposes.\n\n"
    );
    Ok(())
}

/// Test output format metadata
#[test]
fn test_outputFormat_metadata_shouldBeConsistent() {
    assert_eq!(OutputFormat::Vtt.mime_type(), "text/vtt");
    assert_eq!(OutputFormat::Srt.mime_type(), "text/plain");
    assert_eq!(OutputFormat::Txt.extension(), "txt");
    assert!(!OutputFormat::Txt.is_markup());
    assert_eq!(OutputFormat::default(), OutputFormat::Srt);
}
