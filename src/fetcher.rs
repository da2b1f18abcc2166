/*!
 * Fallback-chain fetcher.
 *
 * One item is fetched by an explicit state machine:
 *
 * `TryPrimary -> TryPrimaryRetry(n) -> TrySecondary -> TrySecondaryRetry(n) -> Success | Failed`
 *
 * Transient failures are retried against the same source with exponential
 * backoff. Structural primary failures (captions disabled, no track, access
 * denied, unparseable document) skip straight to the secondary source. The
 * full path taken is recorded in the returned [`FetchReport`].
 */

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::app_config::RetryConfig;
use crate::errors::{FetchError, SourceError};
use crate::file_utils::SessionToken;
use crate::providers::{Item, PrimarySource, RawCaptions, SecondarySource};
use crate::resolver::{CatalogKey, LanguageRequest, LanguageResolver, LanguageTrackCatalog, TrackSelection};
use crate::subtitle_processor::CueDocument;

/// Attempt ceiling and backoff schedule for one source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Policy that retries without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_max_ms),
        )
    }
}

/// States visited while fetching one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    TryPrimary,
    /// Retry number `n` against the primary source
    TryPrimaryRetry(u32),
    TrySecondary,
    /// Retry number `n` against the secondary source
    TrySecondaryRetry(u32),
    Success,
    Failed,
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchState::TryPrimary => write!(f, "primary"),
            FetchState::TryPrimaryRetry(n) => write!(f, "primary retry {}", n),
            FetchState::TrySecondary => write!(f, "secondary"),
            FetchState::TrySecondaryRetry(n) => write!(f, "secondary retry {}", n),
            FetchState::Success => write!(f, "success"),
            FetchState::Failed => write!(f, "failed"),
        }
    }
}

/// A fetched caption document with what was actually used
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub document: CueDocument,
    /// Catalog code of the track that was fetched
    pub language_used: String,
    /// The track was speech-recognition output
    pub is_auto_generated: bool,
    /// The document came from the secondary source
    pub used_fallback_source: bool,
}

/// How fetching one item ended
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Ok(FetchResult),
    /// The primary failed and no secondary was available
    PrimaryFailed(FetchError),
    /// The secondary failed; `primary` is absent when the primary was disabled
    BothFailed {
        primary: Option<FetchError>,
        secondary: FetchError,
    },
}

/// Outcome plus the path taken to reach it
#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    pub outcome: FetchOutcome,
    pub trace: Vec<FetchState>,
    pub primary_attempts: u32,
    pub secondary_attempts: u32,
}

impl FetchReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Ok(_))
    }

    /// The error worth showing the user: the last source's failure
    pub fn final_error(&self) -> Option<&FetchError> {
        match &self.outcome {
            FetchOutcome::Ok(_) => None,
            FetchOutcome::PrimaryFailed(error) => Some(error),
            FetchOutcome::BothFailed { secondary, .. } => Some(secondary),
        }
    }

    pub fn into_result(self) -> Result<FetchResult, FetchError> {
        match self.outcome {
            FetchOutcome::Ok(result) => Ok(result),
            FetchOutcome::PrimaryFailed(error) => Err(error),
            FetchOutcome::BothFailed { secondary, .. } => Err(secondary),
        }
    }
}

/// Runs the primary/secondary chain for one item at a time
pub struct FallbackFetcher {
    primary: Option<Arc<dyn PrimarySource>>,
    secondary: Option<Arc<dyn SecondarySource>>,
    resolver: LanguageResolver,
    primary_policy: RetryPolicy,
    secondary_policy: RetryPolicy,
    session: Option<Arc<SessionToken>>,
}

impl FallbackFetcher {
    pub fn new(resolver: LanguageResolver) -> Self {
        Self {
            primary: None,
            secondary: None,
            resolver,
            primary_policy: RetryPolicy::immediate(3),
            secondary_policy: RetryPolicy::immediate(5),
            session: None,
        }
    }

    pub fn with_primary(mut self, source: Arc<dyn PrimarySource>, policy: RetryPolicy) -> Self {
        self.primary = Some(source);
        self.primary_policy = policy;
        self
    }

    pub fn with_secondary(mut self, source: Arc<dyn SecondarySource>, policy: RetryPolicy) -> Self {
        self.secondary = Some(source);
        self.secondary_policy = policy;
        self
    }

    /// Session cookies handed to the secondary source; read-only here
    pub fn with_session(mut self, session: Option<Arc<SessionToken>>) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> Option<&SessionToken> {
        self.session.as_deref()
    }

    pub fn resolver(&self) -> &LanguageResolver {
        &self.resolver
    }

    /// Fetch one item through the chain
    pub async fn fetch(&self, item: &Item, request: &LanguageRequest, batch_mode: bool) -> FetchReport {
        let mut trace = Vec::new();
        let mut primary_attempts = 0u32;
        let mut secondary_attempts = 0u32;
        let mut primary_error: Option<FetchError> = None;
        let mut secondary_error: Option<FetchError> = None;
        let mut result: Option<FetchResult> = None;

        let mut state = match (&self.primary, &self.secondary) {
            (Some(_), _) => FetchState::TryPrimary,
            (None, Some(_)) => FetchState::TrySecondary,
            (None, None) => FetchState::Failed,
        };

        loop {
            trace.push(state);
            state = match state {
                FetchState::TryPrimary | FetchState::TryPrimaryRetry(_) => {
                    let Some(primary) = &self.primary else {
                        break;
                    };
                    primary_attempts += 1;
                    match self.primary_once(primary.as_ref(), item, request, batch_mode).await {
                        Ok(fetched) => {
                            result = Some(fetched);
                            FetchState::Success
                        }
                        Err(e) if e.is_transient() && primary_attempts < self.primary_policy.max_attempts => {
                            let delay = self.primary_policy.delay_for(primary_attempts);
                            debug!(
                                "Primary attempt {}/{} for '{}' failed: {}; retrying in {:?}",
                                primary_attempts, self.primary_policy.max_attempts, item.title, e, delay
                            );
                            tokio::time::sleep(delay).await;
                            FetchState::TryPrimaryRetry(primary_attempts)
                        }
                        Err(e) => {
                            debug!("Primary source gave up on '{}': {}", item.title, e);
                            primary_error = Some(e);
                            if self.secondary.is_some() {
                                FetchState::TrySecondary
                            } else {
                                FetchState::Failed
                            }
                        }
                    }
                }
                FetchState::TrySecondary | FetchState::TrySecondaryRetry(_) => {
                    let Some(secondary) = &self.secondary else {
                        break;
                    };
                    secondary_attempts += 1;
                    match self.secondary_once(secondary.as_ref(), item, request, batch_mode).await {
                        Ok(fetched) => {
                            result = Some(fetched);
                            FetchState::Success
                        }
                        Err(e) if e.is_transient() && secondary_attempts < self.secondary_policy.max_attempts => {
                            let delay = self.secondary_policy.delay_for(secondary_attempts);
                            debug!(
                                "Secondary attempt {}/{} for '{}' failed: {}; retrying in {:?}",
                                secondary_attempts, self.secondary_policy.max_attempts, item.title, e, delay
                            );
                            tokio::time::sleep(delay).await;
                            FetchState::TrySecondaryRetry(secondary_attempts)
                        }
                        Err(e) => {
                            debug!("Secondary source gave up on '{}': {}", item.title, e);
                            secondary_error = Some(e);
                            FetchState::Failed
                        }
                    }
                }
                FetchState::Success | FetchState::Failed => break,
            };
        }

        let outcome = match (result, primary_error, secondary_error) {
            (Some(fetched), _, _) => FetchOutcome::Ok(fetched),
            (None, primary, Some(secondary)) => FetchOutcome::BothFailed { primary, secondary },
            (None, Some(primary), None) => FetchOutcome::PrimaryFailed(primary),
            (None, None, None) => FetchOutcome::PrimaryFailed(FetchError::Source(
                SourceError::Unavailable("no caption source is enabled".to_string()),
            )),
        };

        FetchReport {
            outcome,
            trace,
            primary_attempts,
            secondary_attempts,
        }
    }

    /// Catalog for an item, from the primary source or else the secondary
    pub async fn list_languages(&self, item: &Item, batch_mode: bool) -> Result<LanguageTrackCatalog, FetchError> {
        let mut last_error = None;

        if let Some(primary) = &self.primary {
            let key = CatalogKey::new(primary.name(), &item.id, batch_mode);
            if let Some(catalog) = self.resolver.cache().get(&key) {
                return Ok(catalog);
            }
            match primary.list_languages(&item.id).await {
                Ok(catalog) => {
                    self.resolver.cache().store(key, catalog.clone());
                    return Ok(catalog);
                }
                Err(e) => {
                    debug!("Primary catalog for '{}' unavailable: {}", item.title, e);
                    last_error = Some(e);
                }
            }
        }

        if let Some(secondary) = &self.secondary {
            let key = CatalogKey::new(secondary.name(), &item.id, batch_mode);
            if let Some(catalog) = self.resolver.cache().get(&key) {
                return Ok(catalog);
            }
            let catalog = secondary.list_languages(&item.id, self.session.as_deref()).await?;
            self.resolver.cache().store(key, catalog.clone());
            return Ok(catalog);
        }

        Err(last_error
            .unwrap_or_else(|| SourceError::Unavailable("no caption source is enabled".to_string()))
            .into())
    }

    async fn primary_once(
        &self,
        source: &dyn PrimarySource,
        item: &Item,
        request: &LanguageRequest,
        batch_mode: bool,
    ) -> Result<FetchResult, FetchError> {
        let key = CatalogKey::new(source.name(), &item.id, batch_mode);
        let catalog = match self.resolver.cache().get(&key) {
            Some(catalog) => catalog,
            None => {
                let catalog = source.list_languages(&item.id).await?;
                self.resolver.cache().store(key, catalog.clone());
                catalog
            }
        };

        let selection = self.resolve(item, &catalog, request)?;
        let raw = source.fetch(&item.id, &selection).await?;
        build_result(raw, selection, false)
    }

    async fn secondary_once(
        &self,
        source: &dyn SecondarySource,
        item: &Item,
        request: &LanguageRequest,
        batch_mode: bool,
    ) -> Result<FetchResult, FetchError> {
        let session = self.session.as_deref();
        let key = CatalogKey::new(source.name(), &item.id, batch_mode);
        let catalog = match self.resolver.cache().get(&key) {
            Some(catalog) => catalog,
            None => {
                let catalog = source.list_languages(&item.id, session).await?;
                self.resolver.cache().store(key, catalog.clone());
                catalog
            }
        };

        let selection = self.resolve(item, &catalog, request)?;
        let mut requested = vec![selection.language.clone()];
        if let LanguageRequest::Codes(codes) = request {
            requested.extend(codes.iter().filter(|c| **c != selection.language).cloned());
        }

        let raw = source.fetch(&item.id, &selection, &requested, session).await?;
        build_result(raw, selection, true)
    }

    fn resolve(
        &self,
        item: &Item,
        catalog: &LanguageTrackCatalog,
        request: &LanguageRequest,
    ) -> Result<TrackSelection, FetchError> {
        Ok(self.resolver.resolve(&item.title, catalog, request)?)
    }
}

fn build_result(raw: RawCaptions, selection: TrackSelection, used_fallback_source: bool) -> Result<FetchResult, FetchError> {
    let language_used = raw.language.unwrap_or_else(|| selection.language.clone());
    let is_auto_generated = selection.is_automatic();
    let document = CueDocument::parse(&raw.text, raw.dialect)?
        .with_metadata(Some(language_used.clone()), is_auto_generated);

    Ok(FetchResult {
        document,
        language_used,
        is_auto_generated,
        used_fallback_source,
    })
}
