/*!
 * Video and playlist URL classification.
 *
 * Accepts `youtu.be/<id>` short links, `watch?v=<id>`, `playlist?list=<id>`
 * and watch links carrying both `v` and `list`, and turns them into canonical
 * targets for the item resolver.
 */

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::AppError;

// @const: Canonical URL prefixes
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const PLAYLIST_URL: &str = "https://www.youtube.com/playlist?list=";

/// Which half of a video-in-playlist link to follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Process the whole playlist
    #[default]
    Playlist,
    /// Process only the linked video
    Video,
}

/// A classified URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlTarget {
    Video { id: String },
    Playlist { id: String },
    /// A video opened from within a playlist
    Both { video_id: String, playlist_id: String },
}

impl UrlTarget {
    /// Collapse a `Both` target according to the scope choice
    pub fn narrow(self, scope: Scope) -> UrlTarget {
        match (self, scope) {
            (UrlTarget::Both { playlist_id, .. }, Scope::Playlist) => UrlTarget::Playlist { id: playlist_id },
            (UrlTarget::Both { video_id, .. }, Scope::Video) => UrlTarget::Video { id: video_id },
            (other, _) => other,
        }
    }

    /// Canonical URL of the target; for `Both` the playlist URL
    pub fn canonical_url(&self) -> String {
        match self {
            UrlTarget::Video { id } => video_url(id),
            UrlTarget::Playlist { id } | UrlTarget::Both { playlist_id: id, .. } => playlist_url(id),
        }
    }

    pub fn is_playlist(&self) -> bool {
        !matches!(self, UrlTarget::Video { .. })
    }
}

/// Canonical watch URL for a video id
pub fn video_url(id: &str) -> String {
    format!("{}{}", WATCH_URL, id)
}

/// Canonical playlist URL for a playlist id
pub fn playlist_url(id: &str) -> String {
    format!("{}{}", PLAYLIST_URL, id)
}

/// Classify a user supplied URL
pub fn classify_url(input: &str) -> Result<UrlTarget, AppError> {
    let trimmed = input.trim();
    let parsed = Url::parse(trimmed)
        .or_else(|_| Url::parse(&format!("https://{}", trimmed)))
        .map_err(|e| AppError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

    let query = |name: &str| {
        parsed
            .query_pairs()
            .find(|(k, v)| k == name && !v.is_empty())
            .map(|(_, v)| v.into_owned())
    };

    let host = parsed.host_str().unwrap_or_default().trim_start_matches("www.");
    let video_id = if host == "youtu.be" {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    } else {
        query("v")
    };
    let playlist_id = query("list");

    match (video_id, playlist_id) {
        (Some(video_id), Some(playlist_id)) => Ok(UrlTarget::Both { video_id, playlist_id }),
        (Some(id), None) => Ok(UrlTarget::Video { id }),
        (None, Some(id)) => Ok(UrlTarget::Playlist { id }),
        (None, None) => Err(AppError::InvalidUrl(format!(
            "{}: please provide a video or playlist URL",
            trimmed
        ))),
    }
}
