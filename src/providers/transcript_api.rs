use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;

use crate::errors::SourceError;
use crate::providers::{PrimarySource, RawCaptions};
use crate::resolver::{LanguageTrackCatalog, TrackKind, TrackSelection};
use crate::subtitle_processor::Dialect;

// @const: Default site root
const DEFAULT_BASE_URL: &str = "https://www.youtube.com";

// @const: Player configuration embedded in the watch page
static PLAYER_RESPONSE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)ytInitialPlayerResponse\s*=\s*(\{.+?\})\s*;\s*(?:var\s|</script>|\n)").unwrap()
});

/// Watch-page player configuration, reduced to what caption lookup needs
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    #[serde(default)]
    pub playability_status: Option<PlayabilityStatus>,
    #[serde(default)]
    pub captions: Option<Captions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayabilityStatus {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Captions {
    #[serde(rename = "playerCaptionsTracklistRenderer", default)]
    pub tracklist: Option<CaptionTracklist>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTracklist {
    #[serde(default)]
    pub caption_tracks: Vec<CaptionTrack>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    /// `asr` marks speech-recognition tracks
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    pub fn kind(&self) -> TrackKind {
        match self.kind.as_deref() {
            Some("asr") => TrackKind::Automatic,
            _ => TrackKind::Manual,
        }
    }
}

/// Primary source: the video site's public caption-track endpoints
#[derive(Debug)]
pub struct TranscriptApi {
    client: Client,
    base_url: String,
}

impl TranscriptApi {
    pub fn new(timeout: Duration, user_agent: &str) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_static("en-US,en;q=0.9"));

        Self {
            client: Client::builder()
                .timeout(timeout)
                .user_agent(user_agent)
                .default_headers(headers)
                .build()
                .unwrap_or_default(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at another host (local test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        let response = self.client.get(url).send().await.map_err(map_request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status));
        }
        response.text().await.map_err(map_request_error)
    }

    /// Load the watch page and read its track list; not memoized here
    async fn caption_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>, SourceError> {
        let url = format!("{}/watch?v={}", self.base_url, video_id);
        let html = self.get_text(&url).await?;
        let player = parse_player_response(&html)?;
        let tracks = caption_tracks_of(&player)?;
        debug!("Watch page of {} lists {} caption track(s)", video_id, tracks.len());
        Ok(tracks)
    }
}

#[async_trait]
impl PrimarySource for TranscriptApi {
    fn name(&self) -> &str {
        "transcript-api"
    }

    async fn list_languages(&self, item_id: &str) -> Result<LanguageTrackCatalog, SourceError> {
        let tracks = self.caption_tracks(item_id).await?;
        Ok(catalog_from_tracks(&tracks))
    }

    async fn fetch(&self, item_id: &str, selection: &TrackSelection) -> Result<RawCaptions, SourceError> {
        let tracks = self.caption_tracks(item_id).await?;
        let track = tracks
            .iter()
            .find(|t| t.language_code == selection.language && t.kind() == selection.kind)
            .ok_or_else(|| {
                SourceError::NoTranscriptFound(format!("{} track '{}'", selection.kind, selection.language))
            })?;

        let mut url = if track.base_url.starts_with('/') {
            format!("{}{}", self.base_url, track.base_url)
        } else {
            track.base_url.clone()
        };
        url.push_str("&fmt=vtt");

        let text = self.get_text(&url).await?;
        if text.trim().is_empty() {
            return Err(SourceError::NoTranscriptFound(format!(
                "empty response for track '{}'",
                selection.language
            )));
        }

        Ok(RawCaptions {
            text,
            dialect: Dialect::Vtt,
            language: Some(track.language_code.clone()),
        })
    }
}

/// Extract the player configuration from a watch page
pub fn parse_player_response(html: &str) -> Result<PlayerResponse, SourceError> {
    let json = PLAYER_RESPONSE_REGEX
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| {
            if html.contains("g-recaptcha") || html.contains("consent.youtube.com") {
                SourceError::SignInRequired("the watch page is behind a verification interstitial".to_string())
            } else {
                SourceError::Unavailable("watch page carries no player configuration".to_string())
            }
        })?;

    serde_json::from_str(json).map_err(|e| SourceError::Unavailable(format!("player configuration: {}", e)))
}

/// Caption tracks of a player configuration, or why there are none
pub fn caption_tracks_of(player: &PlayerResponse) -> Result<Vec<CaptionTrack>, SourceError> {
    if let Some(status) = &player.playability_status {
        classify_playability(status)?;
    }

    let tracks = player
        .captions
        .as_ref()
        .and_then(|c| c.tracklist.as_ref())
        .map(|t| t.caption_tracks.clone())
        .unwrap_or_default();

    if tracks.is_empty() {
        return Err(SourceError::TranscriptDisabled);
    }
    Ok(tracks)
}

/// Build a catalog preserving the page's track order
pub fn catalog_from_tracks(tracks: &[CaptionTrack]) -> LanguageTrackCatalog {
    let mut catalog = LanguageTrackCatalog::new();
    for track in tracks {
        match track.kind() {
            TrackKind::Manual => catalog.add_manual(&track.language_code),
            TrackKind::Automatic => catalog.add_automatic(&track.language_code),
        }
    }
    catalog
}

fn classify_playability(status: &PlayabilityStatus) -> Result<(), SourceError> {
    let reason = status.reason.clone().unwrap_or_else(|| status.status.clone());
    let lowered = reason.to_lowercase();

    match status.status.as_str() {
        "OK" => Ok(()),
        "LOGIN_REQUIRED" if lowered.contains("bot") => Err(SourceError::SignInRequired(reason)),
        "LOGIN_REQUIRED" | "AGE_CHECK_REQUIRED" | "CONTENT_CHECK_REQUIRED" => Err(SourceError::AccessDenied(reason)),
        _ if lowered.contains("age") || lowered.contains("private") || lowered.contains("members") => {
            Err(SourceError::AccessDenied(reason))
        }
        _ => Err(SourceError::Unavailable(reason)),
    }
}

fn map_status(status: StatusCode) -> SourceError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SourceError::Transient(format!("HTTP {}", status))
    } else if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
        SourceError::AccessDenied(format!("HTTP {}", status))
    } else {
        SourceError::Unavailable(format!("HTTP {}", status))
    }
}

fn map_request_error(error: reqwest::Error) -> SourceError {
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        SourceError::Transient(error.to_string())
    } else {
        SourceError::Unavailable(error.to_string())
    }
}
