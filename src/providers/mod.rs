/*!
 * Caption sources.
 *
 * This module defines the seams the pipeline talks through and ships one
 * implementation of each:
 * - `transcript_api`: lightweight HTTP transcript service (primary)
 * - `ytdlp`: download-based extractor driving `yt-dlp` (secondary, also
 *   resolves playlist items)
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::SourceError;
use crate::file_utils::SessionToken;
use crate::resolver::{LanguageTrackCatalog, TrackSelection};
use crate::subtitle_processor::Dialect;
use crate::url_utils::UrlTarget;

/// One video to fetch captions for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub title: String,
}

impl Item {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Items behind a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBatch {
    /// Items in playlist order
    pub items: Vec<Item>,
    /// Playlist title, or the video title for a single video
    pub title: String,
    /// The URL named a playlist
    pub is_batch: bool,
}

impl ResolvedBatch {
    /// Keep only the given 1-based positions, in playlist order
    pub fn select(mut self, positions: &[usize]) -> Self {
        if positions.is_empty() {
            return self;
        }
        self.items = self
            .items
            .into_iter()
            .enumerate()
            .filter(|(i, _)| positions.contains(&(i + 1)))
            .map(|(_, item)| item)
            .collect();
        self
    }
}

/// Caption text as delivered by a source, before parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCaptions {
    pub text: String,
    pub dialect: Dialect,
    /// Language code the source actually delivered, when it says so
    pub language: Option<String>,
}

impl RawCaptions {
    pub fn new(text: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            text: text.into(),
            dialect,
            language: None,
        }
    }
}

/// Turns a classified URL into the items to process
///
/// Single videos are fully extracted, so restricted ones need the session.
#[async_trait]
pub trait ItemResolver: Send + Sync + Debug {
    async fn resolve_items(
        &self,
        target: &UrlTarget,
        session: Option<&SessionToken>,
    ) -> Result<ResolvedBatch, SourceError>;
}

/// Lightweight transcript service
#[async_trait]
pub trait PrimarySource: Send + Sync + Debug {
    /// Name used in logs and cache keys
    fn name(&self) -> &str {
        "primary"
    }

    /// Languages offered for an item
    async fn list_languages(&self, item_id: &str) -> Result<LanguageTrackCatalog, SourceError>;

    /// Fetch the selected track
    async fn fetch(&self, item_id: &str, selection: &TrackSelection) -> Result<RawCaptions, SourceError>;
}

/// Download-based extractor, optionally running with session cookies
#[async_trait]
pub trait SecondarySource: Send + Sync + Debug {
    /// Name used in logs and cache keys
    fn name(&self) -> &str {
        "secondary"
    }

    /// Languages offered for an item
    async fn list_languages(
        &self,
        item_id: &str,
        session: Option<&SessionToken>,
    ) -> Result<LanguageTrackCatalog, SourceError>;

    /// Download the selected track; `requested` drives artifact discovery
    async fn fetch(
        &self,
        item_id: &str,
        selection: &TrackSelection,
        requested: &[String],
        session: Option<&SessionToken>,
    ) -> Result<RawCaptions, SourceError>;
}

pub mod transcript_api;
pub mod ytdlp;
