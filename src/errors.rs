/*!
 * Error types for the subgrab application.
 *
 * This module contains custom error types for the different stages of the
 * caption pipeline, using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors reported by a caption source (primary or secondary)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The item has captions switched off entirely
    #[error("Transcripts are disabled for this video")]
    TranscriptDisabled,

    /// The source has no caption track the request could use
    #[error("No transcript found: {0}")]
    NoTranscriptFound(String),

    /// Age-gated, private or otherwise restricted item
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The source demands an interactive sign-in (bot interstitial)
    #[error("Sign-in required: {0}")]
    SignInRequired(String),

    /// Network or timeout shaped failure, worth retrying
    #[error("Transient source error: {0}")]
    Transient(String),

    /// Any other failure reported by the source
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    /// Whether the failure looks like a network hiccup rather than a verdict
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }

    /// Actionable advice for restriction failures
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            SourceError::AccessDenied(_) => Some(
                "upload a cookies file exported from a signed-in browser session (--cookies)",
            ),
            SourceError::SignInRequired(_) => Some(
                "disable any VPN or proxy network restriction, or supply a cookies file (--cookies)",
            ),
            _ => None,
        }
    }
}

/// Errors raised while parsing caption text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Not a single cue block could be recovered from the input
    #[error("Malformed caption input: {0}")]
    MalformedInput(String),
}

/// Errors raised while choosing a caption track
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Nothing in the catalog satisfied the request
    #[error("No caption track available for '{item}' in language(s): {}", .requested.join(", "))]
    NoTrackAvailable {
        /// Item id or title the lookup was made for
        item: String,
        /// Requested language codes, in preference order
        requested: Vec<String>,
    },
}

/// Per-item failure recorded by the fallback fetcher
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Error from a caption source
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Error from track resolution
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Error from parsing the fetched document
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl FetchError {
    /// Whether another attempt against the same source could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Source(e) if e.is_transient())
    }

    /// Actionable advice, when the failure has one
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            FetchError::Source(e) => e.hint(),
            _ => None,
        }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// The input could not be understood as a video or playlist URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The whole batch finished without a single caption document
    #[error("No documents produced: none of the {attempted} item(s) yielded subtitles")]
    NoDocumentsProduced {
        /// Number of items that were attempted
        attempted: usize,
    },

    /// Configuration problem
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error while packaging the archive
    #[error("Archive error: {0}")]
    Archive(String),

    /// Error from a caption source outside of a per-item fetch
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Error from caption parsing outside of a per-item fetch
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
