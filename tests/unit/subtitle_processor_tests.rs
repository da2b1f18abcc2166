/*!
 * Tests for the cue document model
 */

use subgrab::errors::CodecError;
use subgrab::subtitle_processor::{is_index_line, is_timing_line, Cue, CueDocument, Dialect};
use crate::common;

/// Test timestamp parsing in both dialects
#[test]
fn test_parse_timestamp_withBothSeparators_shouldYieldMilliseconds() {
    assert_eq!(Cue::parse_timestamp("00:00:01,500").unwrap(), 1500);
    assert_eq!(Cue::parse_timestamp("01:02:03.004").unwrap(), 3_723_004);
    // Short WebVTT form without hours
    assert_eq!(Cue::parse_timestamp("02:03.250").unwrap(), 123_250);
}

/// Test that impossible components are rejected
#[test]
fn test_parse_timestamp_withInvalidComponents_shouldFail() {
    assert!(Cue::parse_timestamp("00:61:00,000").is_err());
    assert!(Cue::parse_timestamp("not a time").is_err());
}

/// Test timestamp formatting per dialect
#[test]
fn test_format_timestamp_shouldUseDialectSeparator() {
    assert_eq!(Cue::format_timestamp(3_723_004, Dialect::Srt), "01:02:03,004");
    assert_eq!(Cue::format_timestamp(3_723_004, Dialect::Vtt), "01:02:03.004");
}

/// Test dialect detection
#[test]
fn test_detect_withSamples_shouldRecognizeDialect() {
    assert_eq!(Dialect::detect(common::SAMPLE_SRT), Dialect::Srt);
    assert_eq!(Dialect::detect(common::SAMPLE_VTT), Dialect::Vtt);
    assert_eq!(Dialect::detect("\u{feff}WEBVTT\n"), Dialect::Vtt);
    assert_eq!(Dialect::detect("just words\nmore words\n"), Dialect::Plain);
}

/// Test parsing a well formed SRT document
#[test]
fn test_parse_withSrt_shouldReadAllCues() {
    let doc = CueDocument::parse(common::SAMPLE_SRT, Dialect::Srt).unwrap();

    assert_eq!(doc.len(), 3);
    assert_eq!(doc.cues[0].index, 1);
    assert_eq!(doc.cues[0].timing.unwrap().start_ms, 1000);
    assert_eq!(doc.cues[2].text(), "For testing purposes.");
}

/// Test that VTT framing and cue settings are handled
#[test]
fn test_parse_withVttFraming_shouldDropHeaderAndKeepSettings() {
    let doc = CueDocument::parse(common::SAMPLE_VTT, Dialect::Vtt).unwrap();

    assert_eq!(doc.len(), 2);
    assert_eq!(doc.cues[0].settings.as_deref(), Some("align:start position:0%"));
    assert!(doc.cues.iter().all(|c| !c.text().contains("Kind:")));
}

/// Test that NOTE and STYLE blocks vanish
#[test]
fn test_parse_withNoteAndStyleBlocks_shouldSkipThem() {
    let raw = "WEBVTT\n\nNOTE this is a comment\nspanning lines\n\nSTYLE\n::cue { color: red }\n\n00:01.000 --> 00:02.000\nHi\n";
    let doc = CueDocument::parse(raw, Dialect::Vtt).unwrap();
    assert_eq!(doc.len(), 1);
    assert_eq!(doc.cues[0].text(), "Hi");
}

/// Test that one malformed block does not sink the document
#[test]
fn test_parse_withMalformedBlock_shouldSkipItAndRenumber() {
    let raw = "1\n00:00:01,000 --> 00:00:02,000\nFirst\n\n2\ngarbage line\nno timing\n\n3\n00:00:03,000 --> 00:00:04,000\nThird\n";
    let doc = CueDocument::parse(raw, Dialect::Srt).unwrap();

    assert_eq!(doc.len(), 2);
    assert_eq!(doc.cues[1].index, 2);
    assert_eq!(doc.cues[1].text(), "Third");
}

/// Test that input without any cue is rejected
#[test]
fn test_parse_withNoCues_shouldReturnMalformedInput() {
    let result = CueDocument::parse("WEBVTT\n\n", Dialect::Vtt);
    assert!(matches!(result, Err(CodecError::MalformedInput(_))));

    let result = CueDocument::parse("random\ntext\n", Dialect::Srt);
    assert!(matches!(result, Err(CodecError::MalformedInput(_))));
}

/// Test that cues are ordered by start time
#[test]
fn test_parse_withOutOfOrderCues_shouldSortByStart() {
    let raw = "1\n00:00:05,000 --> 00:00:06,000\nLate\n\n2\n00:00:01,000 --> 00:00:02,000\nEarly\n";
    let doc = CueDocument::parse(raw, Dialect::Srt).unwrap();
    assert_eq!(doc.cues[0].text(), "Early");
    assert_eq!(doc.cues[0].index, 1);
}

/// Test CRLF input
#[test]
fn test_parse_withCrlfLineEndings_shouldParse() {
    let raw = common::SAMPLE_SRT.replace('\n', "\r\n");
    let doc = CueDocument::parse(&raw, Dialect::Srt).unwrap();
    assert_eq!(doc.len(), 3);
}

/// Test SRT serialization layout
#[test]
fn test_serialize_withSrt_shouldProduceIndexedBlocks() {
    let doc = CueDocument::new(vec![
        Cue::timed(7, 1000, 2000, vec!["Hello".to_string()]),
        Cue::timed(9, 2000, 3000, vec!["World".to_string(), "again".to_string()]),
    ]);

    let out = doc.serialize(Dialect::Srt);
    assert_eq!(
        out,
        "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n2\n00:00:02,000 --> 00:00:03,000\nWorld\nagain\n\n"
    );
}

/// Test VTT serialization carries the banner once
#[test]
fn test_serialize_withVtt_shouldStartWithBanner() {
    let doc = CueDocument::parse(common::SAMPLE_SRT, Dialect::Srt).unwrap();
    let out = doc.serialize(Dialect::Vtt);

    assert!(out.starts_with("WEBVTT\n\n"));
    assert_eq!(out.matches("WEBVTT").count(), 1);
    assert!(out.contains("00:00:01.000 --> 00:00:04.000"));
}

/// Test numbering continuation across documents
#[test]
fn test_serializeFrom_withOffset_shouldContinueNumbering() {
    let doc = CueDocument::parse(common::SAMPLE_SRT, Dialect::Srt).unwrap();
    let (body, next) = doc.serialize_from(Dialect::Srt, 4);

    assert!(body.starts_with("4\n"));
    assert!(body.contains("\n6\n"));
    assert_eq!(next, 7);
}

/// Test metadata attachment
#[test]
fn test_withMetadata_shouldSetLanguageAndKind() {
    let doc = CueDocument::parse(common::SAMPLE_SRT, Dialect::Srt)
        .unwrap()
        .with_metadata(Some("en".to_string()), true);
    assert_eq!(doc.language.as_deref(), Some("en"));
    assert!(doc.is_auto_generated);
    assert!(doc.to_string().contains("Cues: 3"));
}

/// Test line classification helpers
#[test]
fn test_lineHelpers_shouldClassifyLines() {
    assert!(is_timing_line("00:00:01,000 --> 00:00:02,000"));
    assert!(is_timing_line("00:01.000 --> 00:02.000 align:start"));
    assert!(!is_timing_line("Hello there"));
    assert!(is_index_line(" 42 "));
    assert!(!is_index_line("42 apples"));
}

/// Test that an end before the start is clamped
#[test]
fn test_cueTiming_withEndBeforeStart_shouldClamp() {
    let cue = Cue::timed(1, 5000, 1000, vec!["x".to_string()]);
    let timing = cue.timing.unwrap();
    assert_eq!(timing.end_ms, 5000);
}

/// Test that parse then serialize keeps cue count and order
#[test]
fn test_serialize_afterParse_shouldPreserveCountAndOrder() {
    for (raw, dialect) in [(common::SAMPLE_SRT, Dialect::Srt), (common::SAMPLE_VTT, Dialect::Vtt)] {
        let doc = CueDocument::parse(raw, dialect).unwrap();
        let reparsed = CueDocument::parse(&doc.serialize(dialect), dialect).unwrap();

        assert_eq!(reparsed.len(), doc.len());
        let texts: Vec<String> = reparsed.cues.iter().map(|c| c.text()).collect();
        let original: Vec<String> = doc.cues.iter().map(|c| c.text()).collect();
        assert_eq!(texts, original);
        let indices: Vec<usize> = reparsed.cues.iter().map(|c| c.index).collect();
        assert_eq!(indices, (1..=doc.len()).collect::<Vec<_>>());
    }
}
