/*!
 * Caption track resolution.
 *
 * Picks the track to download from whatever a source reports as available,
 * applying the language preference order, the manual/automatic tiers and the
 * optional fallback to any track. Resolution is pure; the only state is the
 * explicit [`CatalogCache`] the caller hands in.
 */

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::ResolveError;
use crate::language_utils::{is_original_variant, language_codes_match};

/// Availability tiers of one language in a catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// A human-authored track exists
    pub is_manual: bool,
    /// A speech-recognition track exists
    pub is_automatic: bool,
}

/// Languages a source offers for one item, in the order the source reports them
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LanguageTrackCatalog {
    tracks: Vec<(String, TrackDescriptor)>,
}

impl LanguageTrackCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a manual track; merges with an existing entry for the code
    pub fn add_manual(&mut self, code: &str) {
        self.entry(code).is_manual = true;
    }

    /// Record an automatic track; merges with an existing entry for the code
    pub fn add_automatic(&mut self, code: &str) {
        self.entry(code).is_automatic = true;
    }

    /// Builder form used by sources and tests
    pub fn with_manual(mut self, code: &str) -> Self {
        self.add_manual(code);
        self
    }

    /// Builder form used by sources and tests
    pub fn with_automatic(mut self, code: &str) -> Self {
        self.add_automatic(code);
        self
    }

    pub fn get(&self, code: &str) -> Option<TrackDescriptor> {
        self.tracks
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(code))
            .map(|(_, d)| *d)
    }

    /// Entries in source order
    pub fn iter(&self) -> impl Iterator<Item = (&str, TrackDescriptor)> {
        self.tracks.iter().map(|(c, d)| (c.as_str(), *d))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn entry(&mut self, code: &str) -> &mut TrackDescriptor {
        let pos = match self.tracks.iter().position(|(c, _)| c == code) {
            Some(pos) => pos,
            None => {
                self.tracks.push((code.to_string(), TrackDescriptor::default()));
                self.tracks.len() - 1
            }
        };
        &mut self.tracks[pos].1
    }
}

/// Manual or speech-recognition track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Manual,
    Automatic,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Manual => write!(f, "manual"),
            TrackKind::Automatic => write!(f, "auto-generated"),
        }
    }
}

/// What the caller asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageRequest {
    /// Language codes in preference order
    Codes(Vec<String>),
    /// Whatever the source considers its automatically generated track
    Auto,
}

impl LanguageRequest {
    /// Requested codes for messages and artifact matching
    pub fn codes(&self) -> Vec<String> {
        match self {
            LanguageRequest::Codes(codes) => codes.clone(),
            LanguageRequest::Auto => vec!["auto".to_string()],
        }
    }
}

/// The track chosen for an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSelection {
    /// Catalog code of the chosen track
    pub language: String,
    /// Tier of the chosen track
    pub kind: TrackKind,
    /// Requested code that led to the choice, if any
    pub requested: Option<String>,
}

impl TrackSelection {
    pub fn is_automatic(&self) -> bool {
        self.kind == TrackKind::Automatic
    }
}

/// Switches that widen or narrow the search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Accept automatic tracks when no manual one matches
    pub allow_auto_fallback: bool,
    /// Take the first usable track when no requested code matches
    pub fallback_to_any: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            allow_auto_fallback: true,
            fallback_to_any: false,
        }
    }
}

/// Key under which a catalog is memoized
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogKey {
    /// Source that produced the catalog
    pub source: String,
    /// Item id
    pub item_id: String,
    /// Whether the lookup was made as part of a playlist batch
    pub batch_mode: bool,
}

impl CatalogKey {
    pub fn new(source: &str, item_id: &str, batch_mode: bool) -> Self {
        Self {
            source: source.to_string(),
            item_id: item_id.to_string(),
            batch_mode,
        }
    }
}

/// Caller-owned memo of language catalogs
///
/// Lives as long as the caller wants it to; `invalidate` and `clear` give the
/// caller control over staleness.
#[derive(Default)]
pub struct CatalogCache {
    entries: RwLock<HashMap<CatalogKey, LanguageTrackCatalog>>,
    hits: RwLock<usize>,
    misses: RwLock<usize>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a catalog
    pub fn get(&self, key: &CatalogKey) -> Option<LanguageTrackCatalog> {
        let entries = self.entries.read();
        match entries.get(key) {
            Some(catalog) => {
                *self.hits.write() += 1;
                debug!("Catalog cache hit for {} ({})", key.item_id, key.source);
                Some(catalog.clone())
            }
            None => {
                *self.misses.write() += 1;
                None
            }
        }
    }

    /// Store a catalog
    pub fn store(&self, key: CatalogKey, catalog: LanguageTrackCatalog) {
        self.entries.write().insert(key, catalog);
    }

    /// Drop every catalog memoized for an item
    pub fn invalidate(&self, item_id: &str) {
        self.entries.write().retain(|key, _| key.item_id != item_id);
    }

    /// Drop everything
    pub fn clear(&self) {
        self.entries.write().clear();
        *self.hits.write() = 0;
        *self.misses.write() = 0;
    }

    /// (hits, misses, entries)
    pub fn stats(&self) -> (usize, usize, usize) {
        (*self.hits.read(), *self.misses.read(), self.entries.read().len())
    }
}

/// Source-agnostic track resolver
#[derive(Clone)]
pub struct LanguageResolver {
    options: ResolveOptions,
    cache: Arc<CatalogCache>,
}

impl LanguageResolver {
    pub fn new(options: ResolveOptions, cache: Arc<CatalogCache>) -> Self {
        Self { options, cache }
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// The catalog cache this resolver reads through
    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    /// Choose a track for `item` from `catalog`
    pub fn resolve(
        &self,
        item: &str,
        catalog: &LanguageTrackCatalog,
        request: &LanguageRequest,
    ) -> Result<TrackSelection, ResolveError> {
        resolve_track(item, catalog, request, self.options)
    }
}

/// Choose a track for `item` from `catalog`
///
/// For each requested code in order the exact code is tried before its
/// regional variants; a manual match wins, then an automatic match unless
/// auto-fallback is off. With `fallback_to_any` the first usable track in
/// catalog order is taken when nothing matched. That last choice depends on
/// the source's own ordering and is not stable across sources.
pub fn resolve_track(
    item: &str,
    catalog: &LanguageTrackCatalog,
    request: &LanguageRequest,
    options: ResolveOptions,
) -> Result<TrackSelection, ResolveError> {
    let matched = match request {
        LanguageRequest::Codes(codes) => codes.iter().find_map(|code| match_code(catalog, code, options)),
        LanguageRequest::Auto => match_auto(catalog),
    };

    if let Some(selection) = matched {
        debug!(
            "Resolved '{}' to {} track '{}'",
            item, selection.kind, selection.language
        );
        return Ok(selection);
    }

    if options.fallback_to_any {
        let usable = catalog.iter().find_map(|(code, descriptor)| {
            if descriptor.is_manual {
                Some((code, TrackKind::Manual))
            } else if descriptor.is_automatic && (options.allow_auto_fallback || *request == LanguageRequest::Auto) {
                Some((code, TrackKind::Automatic))
            } else {
                None
            }
        });

        if let Some((code, kind)) = usable {
            debug!("No requested language for '{}', falling back to '{}'", item, code);
            return Ok(TrackSelection {
                language: code.to_string(),
                kind,
                requested: None,
            });
        }
    }

    Err(ResolveError::NoTrackAvailable {
        item: item.to_string(),
        requested: request.codes(),
    })
}

fn match_code(catalog: &LanguageTrackCatalog, code: &str, options: ResolveOptions) -> Option<TrackSelection> {
    let code = code.trim();
    // Exact code before its regional variant
    let found = |want: fn(&TrackDescriptor) -> bool| {
        catalog
            .iter()
            .find(|(c, d)| c.eq_ignore_ascii_case(code) && want(d))
            .or_else(|| catalog.iter().find(|(c, d)| language_codes_match(code, c) && want(d)))
            .map(|(c, _)| c.to_string())
    };

    if let Some(language) = found(|d| d.is_manual) {
        return Some(TrackSelection {
            language,
            kind: TrackKind::Manual,
            requested: Some(code.to_string()),
        });
    }

    if options.allow_auto_fallback {
        if let Some(language) = found(|d| d.is_automatic) {
            return Some(TrackSelection {
                language,
                kind: TrackKind::Automatic,
                requested: Some(code.to_string()),
            });
        }
    }

    None
}

fn match_auto(catalog: &LanguageTrackCatalog) -> Option<TrackSelection> {
    let automatic: Vec<&str> = catalog
        .iter()
        .filter(|(_, d)| d.is_automatic)
        .map(|(c, _)| c)
        .collect();

    automatic
        .iter()
        .find(|code| is_original_variant(code))
        .or_else(|| automatic.first())
        .map(|code| TrackSelection {
            language: code.to_string(),
            kind: TrackKind::Automatic,
            requested: None,
        })
}
