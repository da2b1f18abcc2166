/*!
 * Tests for track resolution and the catalog cache
 */

use std::sync::Arc;

use subgrab::errors::ResolveError;
use subgrab::resolver::{
    resolve_track, CatalogCache, CatalogKey, LanguageRequest, LanguageResolver, LanguageTrackCatalog,
    ResolveOptions, TrackKind,
};

fn codes(list: &[&str]) -> LanguageRequest {
    LanguageRequest::Codes(list.iter().map(|c| c.to_string()).collect())
}

/// Test that preference order beats catalog order
#[test]
fn test_resolve_withSeveralMatches_shouldFollowRequestOrder() {
    let catalog = LanguageTrackCatalog::new().with_manual("en").with_manual("fr");
    let selection = resolve_track("v", &catalog, &codes(&["fr", "en"]), ResolveOptions::default()).unwrap();
    assert_eq!(selection.language, "fr");
    assert_eq!(selection.requested.as_deref(), Some("fr"));
}

/// Test that a manual track of a later language does not beat an automatic track of an earlier one
#[test]
fn test_resolve_withAutoForFirstCode_shouldTakeAutoOfFirstCode() {
    let catalog = LanguageTrackCatalog::new().with_automatic("en").with_manual("fr");
    let selection = resolve_track("v", &catalog, &codes(&["en", "fr"]), ResolveOptions::default()).unwrap();
    assert_eq!(selection.language, "en");
    assert_eq!(selection.kind, TrackKind::Automatic);
}

/// Test that manual wins over automatic for the same code
#[test]
fn test_resolve_withBothTiers_shouldPreferManual() {
    let catalog = LanguageTrackCatalog::new().with_automatic("en").with_manual("en");
    assert_eq!(catalog.len(), 1);

    let selection = resolve_track("v", &catalog, &codes(&["en"]), ResolveOptions::default()).unwrap();
    assert_eq!(selection.kind, TrackKind::Manual);
}

/// Test manual-only mode
#[test]
fn test_resolve_withAutoFallbackDisabled_shouldRejectAutomaticTracks() {
    let catalog = LanguageTrackCatalog::new().with_automatic("en");
    let options = ResolveOptions {
        allow_auto_fallback: false,
        fallback_to_any: false,
    };

    let result = resolve_track("My video", &catalog, &codes(&["en"]), options);
    assert_eq!(
        result,
        Err(ResolveError::NoTrackAvailable {
            item: "My video".to_string(),
            requested: vec!["en".to_string()],
        })
    );
}

/// Test that the error message names the requested languages
#[test]
fn test_resolve_withNoMatch_shouldListRequestedCodes() {
    let catalog = LanguageTrackCatalog::new().with_manual("ja");
    let err = resolve_track("Clip", &catalog, &codes(&["en", "de"]), ResolveOptions::default()).unwrap_err();
    assert!(err.to_string().contains("en, de"));
    assert!(err.to_string().contains("Clip"));
}

/// Test the fallback to any available track
#[test]
fn test_resolve_withFallbackToAny_shouldTakeFirstUsableTrack() {
    let catalog = LanguageTrackCatalog::new().with_automatic("ko").with_manual("ja");
    let options = ResolveOptions {
        allow_auto_fallback: false,
        fallback_to_any: true,
    };

    let selection = resolve_track("v", &catalog, &codes(&["en"]), options).unwrap();
    assert_eq!(selection.language, "ja");
    assert_eq!(selection.requested, None);

    let options = ResolveOptions {
        allow_auto_fallback: true,
        fallback_to_any: true,
    };
    let selection = resolve_track("v", &catalog, &codes(&["en"]), options).unwrap();
    assert_eq!(selection.language, "ko");
}

/// Test auto request without any automatic track
#[test]
fn test_resolve_withAutoRequestAndManualOnlyCatalog_shouldFail() {
    let catalog = LanguageTrackCatalog::new().with_manual("en");
    let result = resolve_track("v", &catalog, &LanguageRequest::Auto, ResolveOptions::default());
    assert!(result.is_err());
}

/// Test regional codes match case-insensitively but not their base
#[test]
fn test_resolve_withRegionalCode_shouldMatchExactly() {
    let catalog = LanguageTrackCatalog::new().with_manual("pt-BR");
    let selection = resolve_track("v", &catalog, &codes(&["pt-br"]), ResolveOptions::default()).unwrap();
    assert_eq!(selection.language, "pt-BR");

    assert!(resolve_track("v", &catalog, &codes(&["pt"]), ResolveOptions::default()).is_err());
}

/// Test an empty catalog
#[test]
fn test_resolve_withEmptyCatalog_shouldFailEvenWithFallback() {
    let options = ResolveOptions {
        allow_auto_fallback: true,
        fallback_to_any: true,
    };
    assert!(resolve_track("v", &LanguageTrackCatalog::new(), &codes(&["en"]), options).is_err());
}

/// Test the resolver wrapper keeps its options and cache
#[test]
fn test_languageResolver_shouldDelegateAndShareCache() {
    let cache = Arc::new(CatalogCache::new());
    let resolver = LanguageResolver::new(ResolveOptions::default(), cache.clone());

    resolver
        .cache()
        .store(CatalogKey::new("primary", "abc", false), LanguageTrackCatalog::new().with_manual("en"));
    assert_eq!(cache.stats().2, 1);

    let catalog = cache.get(&CatalogKey::new("primary", "abc", false)).unwrap();
    let selection = resolver.resolve("v", &catalog, &codes(&["en"])).unwrap();
    assert_eq!(selection.language, "en");
}

/// Test that batch mode is part of the cache key
#[test]
fn test_catalogCache_withDifferentBatchMode_shouldMiss() {
    let cache = CatalogCache::new();
    cache.store(CatalogKey::new("primary", "abc", true), LanguageTrackCatalog::new());

    assert!(cache.get(&CatalogKey::new("primary", "abc", false)).is_none());
    assert!(cache.get(&CatalogKey::new("secondary", "abc", true)).is_none());
    assert!(cache.get(&CatalogKey::new("primary", "abc", true)).is_some());
    assert_eq!(cache.stats(), (1, 2, 1));

    cache.clear();
    assert_eq!(cache.stats(), (0, 0, 0));
}

/// Test catalog iteration order
#[test]
fn test_catalog_iter_shouldKeepSourceOrder() {
    let catalog = LanguageTrackCatalog::new()
        .with_manual("fr")
        .with_automatic("en")
        .with_automatic("fr");
    let order: Vec<&str> = catalog.iter().map(|(code, _)| code).collect();
    assert_eq!(order, vec!["fr", "en"]);

    let fr = catalog.get("FR").unwrap();
    assert!(fr.is_manual && fr.is_automatic);
}

/// Test the reference catalog scenarios
#[test]
fn test_resolve_withReferenceCatalog_shouldMatchExpectedTracks() {
    let catalog = LanguageTrackCatalog::new().with_manual("tr").with_automatic("en");

    let manual_only = ResolveOptions {
        allow_auto_fallback: false,
        fallback_to_any: false,
    };
    let selection = resolve_track("v", &catalog, &codes(&["tr", "en"]), manual_only).unwrap();
    assert_eq!((selection.language.as_str(), selection.kind), ("tr", TrackKind::Manual));

    let selection = resolve_track("v", &catalog, &codes(&["en"]), ResolveOptions::default()).unwrap();
    assert_eq!((selection.language.as_str(), selection.kind), ("en", TrackKind::Automatic));

    let result = resolve_track("v", &catalog, &codes(&["fr"]), ResolveOptions::default());
    assert!(matches!(result, Err(ResolveError::NoTrackAvailable { .. })));

    // With the fallback some track is chosen; which one depends on the source's order
    let any = ResolveOptions {
        allow_auto_fallback: true,
        fallback_to_any: true,
    };
    assert!(resolve_track("v", &catalog, &codes(&["fr"]), any).is_ok());
}

/// Test that an exact code beats its original-audio variant regardless of catalog order
#[test]
fn test_resolve_withOrigVariant_shouldPreferExactCode() {
    let catalog = LanguageTrackCatalog::new().with_manual("en-orig").with_manual("en");
    let selection = resolve_track("v", &catalog, &codes(&["en"]), ResolveOptions::default()).unwrap();
    assert_eq!(selection.language, "en");

    let catalog = LanguageTrackCatalog::new().with_manual("EN-orig");
    let selection = resolve_track("v", &catalog, &codes(&[" en "]), ResolveOptions::default()).unwrap();
    assert_eq!(selection.language, "EN-orig");
    assert_eq!(selection.requested.as_deref(), Some("en"));
}
