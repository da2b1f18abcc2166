use std::path::Path;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use serde_json::Value;
use tokio::process::Command;

use crate::codec::OutputFormat;
use crate::errors::SourceError;
use crate::file_utils::{FileManager, SessionToken};
use crate::providers::{Item, ItemResolver, RawCaptions, ResolvedBatch, SecondarySource};
use crate::resolver::{LanguageTrackCatalog, TrackKind, TrackSelection};
use crate::subtitle_processor::Dialect;
use crate::url_utils::{video_url, UrlTarget};

// @const: Pseudo-language yt-dlp lists for live chat replays
const LIVE_CHAT: &str = "live_chat";

/// Secondary source and item resolver backed by the `yt-dlp` executable
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    user_agent: Option<String>,
    timeout: Duration,
    format: OutputFormat,
}

impl YtDlp {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            user_agent: None,
            timeout,
            format: OutputFormat::Srt,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        let user_agent = user_agent.into();
        self.user_agent = (!user_agent.is_empty()).then_some(user_agent);
        self
    }

    /// Target format; drives the requested subtitle format and artifact lookup
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    fn common_args(&self, session: Option<&SessionToken>) -> Vec<String> {
        let mut args = vec!["--no-warnings".to_string(), "--no-progress".to_string()];
        if let Some(user_agent) = &self.user_agent {
            args.push("--user-agent".to_string());
            args.push(user_agent.clone());
        }
        if let Some(session) = session {
            args.push("--cookies".to_string());
            args.push(session.path().to_string_lossy().to_string());
        }
        args
    }

    /// Arguments for downloading one caption track into `dir`
    pub fn download_args(&self, item_id: &str, selection: &TrackSelection, dir: &Path) -> Vec<String> {
        let subtitle_flag = match selection.kind {
            TrackKind::Manual => "--write-subs",
            TrackKind::Automatic => "--write-auto-subs",
        };
        let sub_format = match self.format {
            OutputFormat::Vtt => "vtt/best",
            OutputFormat::Srt | OutputFormat::Txt => "srt/vtt/best",
        };

        vec![
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            subtitle_flag.to_string(),
            "--sub-langs".to_string(),
            selection.language.clone(),
            "--sub-format".to_string(),
            sub_format.to_string(),
            "-o".to_string(),
            dir.join(format!("{}.%(ext)s", item_id)).to_string_lossy().to_string(),
            video_url(item_id),
        ]
    }

    async fn run(&self, args: Vec<String>, session: Option<&SessionToken>) -> Result<Output, SourceError> {
        let mut all_args = self.common_args(session);
        all_args.extend(args);
        debug!("Running {} {}", self.binary, all_args.join(" "));

        let command_future = Command::new(&self.binary).args(&all_args).kill_on_drop(true).output();

        let output = tokio::select! {
            result = command_future => {
                result.map_err(|e| SourceError::Unavailable(format!("failed to execute {}: {}", self.binary, e)))?
            },
            _ = tokio::time::sleep(self.timeout) => {
                return Err(SourceError::Transient(format!(
                    "{} timed out after {} seconds",
                    self.binary,
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let error = classify_stderr(&stderr);
            if !error.is_transient() {
                error!("{} failed: {}", self.binary, stderr.trim());
            }
            return Err(error);
        }

        Ok(output)
    }

    async fn run_json(&self, args: Vec<String>, session: Option<&SessionToken>) -> Result<Value, SourceError> {
        let output = self.run(args, session).await?;
        serde_json::from_slice(&output.stdout)
            .map_err(|e| SourceError::Unavailable(format!("unreadable {} JSON output: {}", self.binary, e)))
    }
}

#[async_trait]
impl ItemResolver for YtDlp {
    async fn resolve_items(
        &self,
        target: &UrlTarget,
        session: Option<&SessionToken>,
    ) -> Result<ResolvedBatch, SourceError> {
        let mut args = vec!["--flat-playlist".to_string(), "-J".to_string()];
        if !target.is_playlist() {
            args.push("--no-playlist".to_string());
        }
        args.push(target.canonical_url());

        let info = self.run_json(args, session).await?;
        batch_from_info(&info, target.is_playlist())
    }
}

#[async_trait]
impl SecondarySource for YtDlp {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn list_languages(
        &self,
        item_id: &str,
        session: Option<&SessionToken>,
    ) -> Result<LanguageTrackCatalog, SourceError> {
        let args = vec![
            "-J".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            video_url(item_id),
        ];
        let info = self.run_json(args, session).await?;
        let catalog = catalog_from_info(&info);

        if catalog.is_empty() {
            return Err(SourceError::NoTranscriptFound(format!("no caption tracks listed for {}", item_id)));
        }
        Ok(catalog)
    }

    async fn fetch(
        &self,
        item_id: &str,
        selection: &TrackSelection,
        requested: &[String],
        session: Option<&SessionToken>,
    ) -> Result<RawCaptions, SourceError> {
        let scratch = tempfile::Builder::new()
            .prefix("subgrab-")
            .tempdir()
            .map_err(|e| SourceError::Unavailable(format!("failed to create scratch directory: {}", e)))?;

        self.run(self.download_args(item_id, selection, scratch.path()), session)
            .await?;

        let artifact = FileManager::locate_caption_artifact(
            scratch.path(),
            item_id,
            requested,
            self.format.extension(),
        )
        .map_err(|e| SourceError::Unavailable(e.to_string()))?
        .ok_or_else(|| {
            SourceError::NoTranscriptFound(format!("no caption file written for language(s): {}", requested.join(", ")))
        })?;

        let text = FileManager::read_to_string(&artifact.path).map_err(|e| SourceError::Unavailable(e.to_string()))?;
        let dialect = match artifact.dialect {
            Dialect::Plain => Dialect::detect(&text),
            markup => markup,
        };

        Ok(RawCaptions {
            text,
            dialect,
            language: (!artifact.language.is_empty()).then_some(artifact.language),
        })
    }
}

/// Classify a failed run by its stderr
pub fn classify_stderr(stderr: &str) -> SourceError {
    let message = stderr
        .lines()
        .rev()
        .find(|line| line.contains("ERROR"))
        .unwrap_or(stderr)
        .trim()
        .to_string();
    let lowered = stderr.to_lowercase();

    if lowered.contains("not a bot") {
        SourceError::SignInRequired(message)
    } else if (lowered.contains("age") && (lowered.contains("restricted") || lowered.contains("confirm your age")))
        || lowered.contains("private video")
        || lowered.contains("members-only")
        || lowered.contains("join this channel")
    {
        SourceError::AccessDenied(message)
    } else if lowered.contains("429")
        || lowered.contains("too many requests")
        || lowered.contains("timed out")
        || lowered.contains("connection reset")
        || lowered.contains("temporary failure")
        || lowered.contains("unable to download")
    {
        SourceError::Transient(message)
    } else if lowered.contains("no subtitles") || lowered.contains("there are no subtitles") {
        SourceError::NoTranscriptFound(message)
    } else {
        SourceError::Unavailable(message)
    }
}

/// Catalog from a `-J` info document, in the order yt-dlp lists languages
pub fn catalog_from_info(info: &Value) -> LanguageTrackCatalog {
    let mut catalog = LanguageTrackCatalog::new();

    if let Some(manual) = info.get("subtitles").and_then(Value::as_object) {
        for code in manual.keys().filter(|c| c.as_str() != LIVE_CHAT) {
            catalog.add_manual(code);
        }
    }
    if let Some(automatic) = info.get("automatic_captions").and_then(Value::as_object) {
        for code in automatic.keys() {
            catalog.add_automatic(code);
        }
    }

    catalog
}

/// Items from a `--flat-playlist -J` info document
pub fn batch_from_info(info: &Value, is_batch: bool) -> Result<ResolvedBatch, SourceError> {
    let title = info
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("untitled")
        .to_string();

    let items = match info.get("entries").and_then(Value::as_array) {
        Some(entries) => entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| {
                let id = entry
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| {
                        entry
                            .get("url")
                            .and_then(Value::as_str)
                            .and_then(|url| url.split("v=").nth(1))
                            .map(|rest| rest.split('&').next().unwrap_or(rest).to_string())
                    })?;
                let title = entry
                    .get("title")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("video_{}", i + 1));
                Some(Item::new(id, title))
            })
            .collect(),
        None => {
            let id = info
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| SourceError::Unavailable("info document has neither entries nor id".to_string()))?;
            vec![Item::new(id, title.clone())]
        }
    };

    Ok(ResolvedBatch { items, title, is_batch })
}
