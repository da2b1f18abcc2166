use anyhow::{anyhow, Result, Context};
use bytes::Bytes;
use log::{warn, info, debug};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use indicatif::{ProgressBar, ProgressStyle};

use crate::aggregator::{self, RenderedDocument};
use crate::app_config::{Config, OutputMode};
use crate::archive::{Archiver, ZipArchiver};
use crate::codec::{self, OutputFormat};
use crate::errors::AppError;
use crate::fetcher::{FallbackFetcher, FetchResult, RetryPolicy};
use crate::file_utils::{FileManager, SessionToken};
use crate::language_utils::format_language_option;
use crate::providers::transcript_api::TranscriptApi;
use crate::providers::ytdlp::YtDlp;
use crate::providers::{Item, ItemResolver, ResolvedBatch};
use crate::resolver::{CatalogCache, LanguageRequest, LanguageResolver, LanguageTrackCatalog, ResolveOptions};
use crate::sanitizer;
use crate::subtitle_processor::Dialect;
use crate::url_utils::{classify_url, UrlTarget};

// @module: Application controller for caption batches

// @struct: Shared cancellation switch, checked between items
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// @struct: Non-fatal failure of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemWarning {
    // @field: Item title
    pub title: String,
    // @field: What went wrong
    pub cause: String,
    // @field: What the user can do about it
    pub hint: Option<String>,
}

impl fmt::Display for ItemWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error downloading subtitles for '{}': {}", self.title, self.cause)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}

/// The deliverable of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutput {
    /// One video, one document
    Single { filename: String, bytes: Bytes },
    /// Several videos concatenated into one document
    Combined { filename: String, bytes: Bytes },
    /// Several videos, one archive entry each
    Archive { filename: String, bytes: Bytes },
}

impl BatchOutput {
    pub fn filename(&self) -> &str {
        match self {
            Self::Single { filename, .. } | Self::Combined { filename, .. } | Self::Archive { filename, .. } => filename,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        match self {
            Self::Single { bytes, .. } | Self::Combined { bytes, .. } | Self::Archive { bytes, .. } => bytes,
        }
    }

    // @returns: MIME type for handing the payload to a browser
    pub fn mime_type(&self, format: OutputFormat) -> &'static str {
        match self {
            Self::Archive { .. } => "application/zip",
            _ => format.mime_type(),
        }
    }
}

/// Result of processing a batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub output: BatchOutput,
    pub warnings: Vec<ItemWarning>,
    pub success_count: usize,
    /// The batch stopped early on request
    pub cancelled: bool,
}

/// Main application controller for caption batches
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Primary/secondary chain
    fetcher: FallbackFetcher,
    // @field: URL to items
    item_resolver: Arc<dyn ItemResolver>,
    // @field: Separate-mode packaging
    archiver: Arc<dyn Archiver>,
    // @field: Set from outside to stop between items
    cancel: CancellationFlag,
    // @field: Draw a terminal progress bar
    show_progress: bool,
}

impl Controller {
    // @method: Create a controller wired to the real sources
    pub fn with_config(config: Config) -> Result<Self> {
        let cache = Arc::new(CatalogCache::new());
        let resolver = LanguageResolver::new(resolve_options(&config), cache);

        let session = match &config.cookies_path {
            Some(path) => Some(Arc::new(
                SessionToken::from_cookie_file(path).context("Failed to prepare session cookies")?,
            )),
            None => None,
        };

        let ytdlp = Arc::new(
            YtDlp::new(config.secondary.binary.clone(), config.secondary.timeout())
                .with_user_agent(config.secondary.user_agent.clone())
                .with_format(config.format),
        );

        let mut fetcher = FallbackFetcher::new(resolver).with_session(session);
        if config.primary.enabled {
            let primary = TranscriptApi::new(config.primary.timeout(), &config.secondary.user_agent);
            fetcher = fetcher.with_primary(Arc::new(primary), RetryPolicy::from(&config.primary.retry));
        }
        if config.secondary.enabled {
            fetcher = fetcher.with_secondary(ytdlp.clone(), RetryPolicy::from(&config.secondary.retry));
        }

        Ok(Self::with_parts(config, fetcher, ytdlp, Arc::new(ZipArchiver)))
    }

    /// Create a controller from explicit parts
    pub fn with_parts(
        config: Config,
        fetcher: FallbackFetcher,
        item_resolver: Arc<dyn ItemResolver>,
        archiver: Arc<dyn Archiver>,
    ) -> Self {
        Self {
            config,
            fetcher,
            item_resolver,
            archiver,
            cancel: CancellationFlag::new(),
            show_progress: false,
        }
    }

    /// Draw an indicatif bar while processing
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle for stopping a running batch
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Forget every memoized language catalog
    pub fn clear_language_cache(&self) {
        self.fetcher.resolver().cache().clear();
        info!("Language cache cleared");
    }

    /// What to ask the resolver for, from the configuration
    pub fn language_request(&self) -> LanguageRequest {
        if self.config.auto_captions {
            LanguageRequest::Auto
        } else {
            LanguageRequest::Codes(self.config.languages.clone())
        }
    }

    /// Classify a URL and resolve the items behind it
    pub async fn resolve_items(&self, url: &str, positions: &[usize]) -> Result<ResolvedBatch, AppError> {
        let target = classify_url(url)?.narrow(self.config.scope);
        debug!("Resolving items for {}", target.canonical_url());

        let batch = self
            .item_resolver
            .resolve_items(&target, self.fetcher.session())
            .await?
            .select(positions);
        if batch.items.is_empty() {
            return Err(AppError::NoDocumentsProduced { attempted: 0 });
        }
        Ok(batch)
    }

    /// Run the whole workflow for a URL and write the output file
    pub async fn run(&self, url: &str, positions: &[usize]) -> Result<(BatchReport, PathBuf)> {
        let batch = self.resolve_items(url, positions).await?;
        info!(
            "Processing {} video(s) from '{}'",
            batch.items.len(),
            batch.title
        );

        let report = self.process_batch(&batch, None).await?;
        let path = self.write_output(&report.output)?;
        Ok((report, path))
    }

    /// Fetch, clean, render and aggregate every item of a batch, in order
    ///
    /// Item failures become warnings. Fails only when no item succeeded.
    pub async fn process_batch(
        &self,
        batch: &ResolvedBatch,
        on_progress: Option<&(dyn Fn(f32) + Send + Sync)>,
    ) -> Result<BatchReport, AppError> {
        let total = batch.items.len();
        let request = self.language_request();
        let format = self.config.format;

        let progress_bar = if self.show_progress {
            let bar = ProgressBar::new(total as u64);
            let template_result = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} videos ({percent}%) {msg}")
                .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(template_result.progress_chars("█▓▒░"));
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut documents = Vec::new();
        let mut warnings = Vec::new();
        let mut cancelled = false;

        for (i, item) in batch.items.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Cancelled after {} of {} video(s)", i, total);
                cancelled = true;
                break;
            }

            progress_bar.set_message(item.title.clone());
            let report = self.fetcher.fetch(item, &request, batch.is_batch).await;
            debug!(
                "'{}': {} primary / {} secondary attempt(s)",
                item.title, report.primary_attempts, report.secondary_attempts
            );

            match report.into_result() {
                Ok(result) => match self.render_item(item, result, format) {
                    Ok(document) => {
                        progress_bar.suspend(|| {
                            info!(
                                "Downloaded subtitles for '{}' in {}",
                                item.title,
                                format_language_option(&document.language)
                            )
                        });
                        documents.push(document);
                    }
                    Err(cause) => warnings.push(self.record_warning(item, cause, None)),
                },
                Err(error) => {
                    let hint = error.hint().map(str::to_string);
                    warnings.push(self.record_warning(item, error.to_string(), hint));
                }
            }

            progress_bar.inc(1);
            if let Some(callback) = on_progress {
                callback((i + 1) as f32 / total.max(1) as f32);
            }
        }

        progress_bar.finish_and_clear();

        if documents.is_empty() {
            return Err(AppError::NoDocumentsProduced { attempted: total });
        }

        let output = self.shape_output(batch, &documents, format)?;
        Ok(BatchReport {
            output,
            warnings,
            success_count: documents.len(),
            cancelled,
        })
    }

    /// Catalog of the first video behind a URL
    ///
    /// `refresh` drops this controller's cached catalogs for the video first;
    /// a new controller starts with an empty cache.
    pub async fn list_languages(&self, url: &str, refresh: bool) -> Result<(Item, LanguageTrackCatalog)> {
        let target = match classify_url(url)? {
            UrlTarget::Both { video_id, .. } => UrlTarget::Video { id: video_id },
            other => other,
        };
        let batch = self
            .item_resolver
            .resolve_items(&target, self.fetcher.session())
            .await
            .map_err(AppError::from)?;
        let item = batch
            .items
            .into_iter()
            .next()
            .ok_or(AppError::NoDocumentsProduced { attempted: 0 })?;

        if refresh {
            self.fetcher.resolver().cache().invalidate(&item.id);
        }

        let catalog = self
            .fetcher
            .list_languages(&item, false)
            .await
            .with_context(|| format!("Failed to list caption languages for '{}'", item.title))?;
        Ok((item, catalog))
    }

    /// Write the output into the configured directory
    pub fn write_output(&self, output: &BatchOutput) -> Result<PathBuf> {
        FileManager::ensure_dir(&self.config.output_dir)?;
        let path = self.config.output_dir.join(output.filename());
        FileManager::write_bytes(&path, output.bytes())?;
        info!("Saved {:?}", path);
        Ok(path)
    }

    fn render_item(&self, item: &Item, result: FetchResult, format: OutputFormat) -> Result<RenderedDocument, String> {
        let document = if self.config.clean_transcript {
            sanitizer::sanitize_cues(&result.document)
        } else {
            result.document
        };
        if document.is_empty() {
            return Err("the transcript contained nothing but advertisements".to_string());
        }

        let mut content = codec::render(&document, format);
        if self.config.clean_transcript {
            content = sanitizer::sanitize(&content);
        }

        Ok(RenderedDocument {
            title: item.title.clone(),
            language: result.language_used,
            content,
        })
    }

    fn shape_output(
        &self,
        batch: &ResolvedBatch,
        documents: &[RenderedDocument],
        format: OutputFormat,
    ) -> Result<BatchOutput, AppError> {
        let max_chars = self.config.filename_max_chars;

        if !batch.is_batch {
            let document = &documents[0];
            return Ok(BatchOutput::Single {
                filename: aggregator::single_filename(&document.title, &document.language, format, max_chars),
                bytes: Bytes::from(document.content.clone()),
            });
        }

        match self.config.output_mode {
            OutputMode::Combined => {
                let combined = aggregator::combine(documents, format)?;
                Ok(BatchOutput::Combined {
                    filename: aggregator::combined_filename(&batch.title, format, max_chars),
                    bytes: Bytes::from(combined),
                })
            }
            OutputMode::Separate => {
                let entries = aggregator::separate(documents, format, max_chars);
                Ok(BatchOutput::Archive {
                    filename: aggregator::archive_filename(&batch.title, max_chars),
                    bytes: self.archiver.package(&entries)?,
                })
            }
        }
    }

    fn record_warning(&self, item: &Item, cause: String, hint: Option<String>) -> ItemWarning {
        let warning = ItemWarning {
            title: item.title.clone(),
            cause,
            hint,
        };
        warn!("{}", warning);
        warning
    }
}

/// Convert a caption file on disk to another format
///
/// The source dialect comes from the extension, or from the content when the
/// extension says nothing. Without an explicit output path the input path
/// with the target extension is used; the input is never overwritten.
pub fn convert_file(input: &Path, output: Option<&Path>, target: OutputFormat, clean: bool) -> Result<PathBuf> {
    if !FileManager::file_exists(input) {
        return Err(anyhow!("Input file does not exist: {:?}", input));
    }

    let raw = FileManager::read_to_string(input)?;
    let from = match input.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
        Some("srt") => Dialect::Srt,
        Some("vtt") => Dialect::Vtt,
        _ => Dialect::detect(&raw),
    };

    let mut converted =
        codec::convert(&raw, from, target.dialect()).with_context(|| format!("Failed to convert {:?}", input))?;
    if clean {
        converted = sanitizer::sanitize(&converted);
    }

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension(target.extension()));
    if output == input {
        return Err(anyhow!("Output would overwrite the input file: {:?}", output));
    }

    FileManager::write_to_file(&output, &converted)?;
    debug!("Converted {:?} ({:?}) to {:?}", input, from, output);
    Ok(output)
}

fn resolve_options(config: &Config) -> ResolveOptions {
    ResolveOptions {
        allow_auto_fallback: !config.prefer_manual_only,
        fallback_to_any: config.fallback_to_any,
    }
}
