/*!
 * Tests for the primary/secondary fallback chain
 */

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use subgrab::errors::{FetchError, SourceError};
use subgrab::fetcher::{FallbackFetcher, FetchOutcome, FetchState, RetryPolicy};
use subgrab::file_utils::SessionToken;
use subgrab::providers::transcript_api::TranscriptApi;
use subgrab::providers::Item;
use subgrab::resolver::{CatalogCache, LanguageRequest, LanguageResolver, LanguageTrackCatalog, ResolveOptions};
use crate::common;
use crate::common::http_server;
use crate::common::mock_sources::FakeSource;

fn resolver() -> LanguageResolver {
    LanguageResolver::new(ResolveOptions::default(), Arc::new(CatalogCache::new()))
}

fn english() -> LanguageRequest {
    LanguageRequest::Codes(vec!["en".to_string()])
}

fn en_catalog() -> LanguageTrackCatalog {
    LanguageTrackCatalog::new().with_manual("en")
}

fn chain(primary: &Arc<FakeSource>, secondary: &Arc<FakeSource>) -> FallbackFetcher {
    FallbackFetcher::new(resolver())
        .with_primary(primary.clone(), RetryPolicy::immediate(3))
        .with_secondary(secondary.clone(), RetryPolicy::immediate(5))
}

/// Test the happy path through the primary source
#[tokio::test]
async fn test_fetch_withPrimarySuccess_shouldNotTouchSecondary() {
    let primary = Arc::new(FakeSource::new("primary").with_item("a", en_catalog(), &common::single_cue_vtt("hi")));
    let secondary = Arc::new(FakeSource::new("secondary"));

    let report = chain(&primary, &secondary).fetch(&Item::new("a", "A"), &english(), false).await;

    assert_eq!(report.trace, vec![FetchState::TryPrimary, FetchState::Success]);
    assert_eq!(report.primary_attempts, 1);
    assert_eq!(report.secondary_attempts, 0);
    assert_eq!(secondary.calls().list_calls + secondary.calls().fetch_calls, 0);

    let result = report.into_result().unwrap();
    assert!(!result.used_fallback_source);
    assert_eq!(result.language_used, "en");
    assert_eq!(result.document.language.as_deref(), Some("en"));
    assert!(!result.is_auto_generated);
}

/// Test that a structural primary failure goes straight to the secondary exactly once
#[tokio::test]
async fn test_fetch_withNoTranscriptFound_shouldCallSecondaryOnce() {
    let primary = Arc::new(FakeSource::new("primary").failing("a", SourceError::NoTranscriptFound("en".into())));
    let secondary = Arc::new(FakeSource::new("secondary").with_item("a", en_catalog(), &common::single_cue_vtt("hi")));

    let report = chain(&primary, &secondary).fetch(&Item::new("a", "A"), &english(), false).await;

    assert_eq!(
        report.trace,
        vec![FetchState::TryPrimary, FetchState::TrySecondary, FetchState::Success]
    );
    assert_eq!(primary.calls().list_calls, 1);
    assert_eq!(primary.calls().fetch_calls, 0);
    assert_eq!(secondary.calls().fetch_calls, 1);
    assert!(report.into_result().unwrap().used_fallback_source);
}

/// Test the retry ceilings of both sources
#[tokio::test]
async fn test_fetch_withPersistentTransientErrors_shouldStopAtCeilings() {
    let transient = SourceError::Transient("connection reset".into());
    let primary = Arc::new(FakeSource::new("primary").failing("a", transient.clone()));
    let secondary = Arc::new(FakeSource::new("secondary").failing("a", transient.clone()));

    let report = chain(&primary, &secondary).fetch(&Item::new("a", "A"), &english(), false).await;

    assert_eq!(report.primary_attempts, 3);
    assert_eq!(report.secondary_attempts, 5);
    assert_eq!(primary.calls().list_calls, 3);
    assert_eq!(secondary.calls().list_calls, 5);
    assert_eq!(report.trace.last(), Some(&FetchState::Failed));
    assert!(report.trace.contains(&FetchState::TryPrimaryRetry(2)));
    assert!(report.trace.contains(&FetchState::TrySecondaryRetry(4)));

    match report.outcome {
        FetchOutcome::BothFailed { primary, secondary } => {
            assert_eq!(primary, Some(FetchError::Source(transient.clone())));
            assert_eq!(secondary, FetchError::Source(transient));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

/// Test that a transient error is retried and the catalog is fetched only once
#[tokio::test]
async fn test_fetch_withFlakyPrimary_shouldRetryThenSucceed() {
    let primary = Arc::new(
        FakeSource::new("primary")
            .with_item("a", en_catalog(), &common::single_cue_vtt("hi"))
            .flaky("a", SourceError::Transient("timeout".into()), 2),
    );
    let secondary = Arc::new(FakeSource::new("secondary"));

    let report = chain(&primary, &secondary).fetch(&Item::new("a", "A"), &english(), false).await;

    assert_eq!(
        report.trace,
        vec![
            FetchState::TryPrimary,
            FetchState::TryPrimaryRetry(1),
            FetchState::TryPrimaryRetry(2),
            FetchState::Success,
        ]
    );
    assert_eq!(primary.calls().list_calls, 1);
    assert_eq!(primary.calls().fetch_calls, 3);
    assert!(report.is_success());
}

/// Test that a non-transient secondary failure is not retried
#[tokio::test]
async fn test_fetch_withSecondaryAccessDenied_shouldNotRetry() {
    let primary = Arc::new(FakeSource::new("primary").failing("a", SourceError::TranscriptDisabled));
    let secondary = Arc::new(FakeSource::new("secondary").failing("a", SourceError::AccessDenied("age".into())));

    let report = chain(&primary, &secondary).fetch(&Item::new("a", "A"), &english(), false).await;

    assert_eq!(report.secondary_attempts, 1);
    let error = report.final_error().cloned().unwrap();
    assert!(error.hint().is_some());
    assert!(matches!(error, FetchError::Source(SourceError::AccessDenied(_))));
}

/// Test that a missing language on the primary still tries the secondary
#[tokio::test]
async fn test_fetch_withResolveErrorOnPrimary_shouldFallBack() {
    let primary = Arc::new(FakeSource::new("primary").with_item(
        "a",
        LanguageTrackCatalog::new().with_manual("fr"),
        &common::single_cue_vtt("salut"),
    ));
    let secondary = Arc::new(FakeSource::new("secondary").with_item("a", en_catalog(), &common::single_cue_vtt("hi")));

    let report = chain(&primary, &secondary).fetch(&Item::new("a", "A"), &english(), false).await;

    assert_eq!(primary.calls().fetch_calls, 0);
    assert_eq!(secondary.calls().fetched_languages, vec!["en".to_string()]);
    assert!(report.is_success());
}

/// Test that an unparseable primary document still tries the secondary
#[tokio::test]
async fn test_fetch_withUnparseablePrimaryDocument_shouldFallBack() {
    let primary = Arc::new(FakeSource::new("primary").with_item("a", en_catalog(), "<html>consent page</html>"));
    let secondary = Arc::new(FakeSource::new("secondary").with_item("a", en_catalog(), &common::single_cue_vtt("hi")));

    let report = chain(&primary, &secondary).fetch(&Item::new("a", "A"), &english(), false).await;

    assert_eq!(report.primary_attempts, 1);
    assert!(report.into_result().unwrap().used_fallback_source);
}

/// Test a primary-only chain
#[tokio::test]
async fn test_fetch_withoutSecondary_shouldReportPrimaryFailure() {
    let primary = Arc::new(FakeSource::new("primary").failing("a", SourceError::SignInRequired("bot check".into())));
    let fetcher = FallbackFetcher::new(resolver()).with_primary(primary, RetryPolicy::immediate(3));

    let report = fetcher.fetch(&Item::new("a", "A"), &english(), false).await;

    assert_eq!(report.trace, vec![FetchState::TryPrimary, FetchState::Failed]);
    assert!(matches!(
        report.outcome,
        FetchOutcome::PrimaryFailed(FetchError::Source(SourceError::SignInRequired(_)))
    ));
}

/// Test a secondary-only chain
#[tokio::test]
async fn test_fetch_withPrimaryDisabled_shouldStartAtSecondary() {
    let secondary = Arc::new(FakeSource::new("secondary").failing("a", SourceError::Unavailable("gone".into())));
    let fetcher = FallbackFetcher::new(resolver()).with_secondary(secondary, RetryPolicy::immediate(5));

    let report = fetcher.fetch(&Item::new("a", "A"), &english(), false).await;

    assert_eq!(report.trace[0], FetchState::TrySecondary);
    assert!(matches!(report.outcome, FetchOutcome::BothFailed { primary: None, .. }));
}

/// Test a chain with no sources at all
#[tokio::test]
async fn test_fetch_withNoSources_shouldFail() {
    let report = FallbackFetcher::new(resolver())
        .fetch(&Item::new("a", "A"), &english(), false)
        .await;
    assert!(!report.is_success());
    assert_eq!(report.trace, vec![FetchState::Failed]);
}

/// Test that the session cookies reach the secondary source
#[tokio::test]
async fn test_fetch_withSession_shouldPassItToSecondary() -> Result<()> {
    let dir = common::create_temp_dir()?;
    let cookies = common::create_test_file(dir.path(), "cookies.txt", "# Netscape HTTP Cookie File\n")?;
    let session = Arc::new(SessionToken::from_cookie_file(&cookies)?);
    let session_path = session.path().to_path_buf();

    let secondary = Arc::new(FakeSource::new("secondary").with_item("a", en_catalog(), &common::single_cue_vtt("hi")));
    let fetcher = FallbackFetcher::new(resolver())
        .with_secondary(secondary.clone(), RetryPolicy::immediate(5))
        .with_session(Some(session));

    let report = fetcher.fetch(&Item::new("a", "A"), &english(), false).await;

    assert!(report.is_success());
    let sessions = secondary.calls().sessions;
    assert!(!sessions.is_empty());
    assert!(sessions.iter().all(|s| s.as_deref() == Some(session_path.as_path())));
    Ok(())
}

/// Test automatic track metadata
#[tokio::test]
async fn test_fetch_withAutoRequest_shouldMarkAutoGenerated() {
    let catalog = LanguageTrackCatalog::new().with_automatic("en").with_automatic("es-orig");
    let primary = Arc::new(FakeSource::new("primary").with_item("a", catalog, &common::single_cue_vtt("hola")));
    let fetcher = FallbackFetcher::new(resolver()).with_primary(primary, RetryPolicy::immediate(3));

    let result = fetcher
        .fetch(&Item::new("a", "A"), &LanguageRequest::Auto, false)
        .await
        .into_result()
        .unwrap();

    assert_eq!(result.language_used, "es-orig");
    assert!(result.is_auto_generated);
    assert!(result.is_auto_generated);
    assert!(!result.used_fallback_source);
    assert_eq!(result.language_used, "en");
}

/// Test catalog listing through the cache
#[tokio::test]
async fn test_listLanguages_calledTwice_shouldHitCache() {
    let primary = Arc::new(FakeSource::new("primary").with_item("a", en_catalog(), ""));
    let fetcher = FallbackFetcher::new(resolver()).with_primary(primary.clone(), RetryPolicy::immediate(3));
    let item = Item::new("a", "A");

    let first = fetcher.list_languages(&item, false).await.unwrap();
    let second = fetcher.list_languages(&item, false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(primary.calls().list_calls, 1);
    assert_eq!(fetcher.resolver().cache().stats().0, 1);

    // Invalidation forces a fresh lookup
    fetcher.resolver().cache().invalidate("a");
    fetcher.list_languages(&item, false).await.unwrap();
    assert_eq!(primary.calls().list_calls, 2);
}

/// Test catalog listing falling back to the secondary
#[tokio::test]
async fn test_listLanguages_withPrimaryFailure_shouldAskSecondary() {
    let primary = Arc::new(FakeSource::new("primary").failing("a", SourceError::TranscriptDisabled));
    let secondary = Arc::new(FakeSource::new("secondary").with_item("a", en_catalog(), ""));

    let catalog = chain(&primary, &secondary).list_languages(&Item::new("a", "A"), false).await.unwrap();
    assert!(catalog.get("en").is_some());
}

/// Test the backoff schedule built from configuration
#[test]
fn test_retryPolicy_fromConfig_shouldUseConfiguredDelays() {
    let config = subgrab::app_config::RetryConfig::with_attempts(5);
    let policy = RetryPolicy::from(&config);

    assert_eq!(policy.max_attempts, 5);
    assert_eq!(policy.delay_for(1), Duration::from_millis(config.backoff_base_ms));
    assert!(policy.delay_for(10) <= Duration::from_millis(config.backoff_max_ms));
    assert_eq!(RetryPolicy::immediate(3).delay_for(2), Duration::ZERO);
}

/// Test that clearing the catalog cache reaches the watch-page source
#[tokio::test]
async fn test_listLanguages_afterCacheClear_shouldReloadWatchPage() {
    let (base_url, hits) = http_server::serve(|hit, _| {
        if hit == 0 {
            http_server::watch_page(&[("tr", false)])
        } else {
            http_server::watch_page(&[("tr", false), ("en", true)])
        }
    })
    .await;
    let api = TranscriptApi::new(Duration::from_secs(5), "subgrab-tests").with_base_url(base_url);
    let fetcher = FallbackFetcher::new(resolver()).with_primary(Arc::new(api), RetryPolicy::immediate(1));
    let item = Item::new("abc", "Clip");

    let first = fetcher.list_languages(&item, false).await.unwrap();
    let cached = fetcher.list_languages(&item, false).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(cached, first);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    fetcher.resolver().cache().clear();
    let refreshed = fetcher.list_languages(&item, false).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(refreshed.len(), 2);
    assert!(refreshed.get("en").unwrap().is_automatic);
}

/// Test a full primary fetch against a local watch page
#[tokio::test]
async fn test_fetch_withWatchPageSource_shouldDownloadSelectedTrack() {
    let (base_url, _) = http_server::serve(|_, target| {
        if target.starts_with("/timedtext?lang=en") && target.contains("fmt=vtt") {
            common::single_cue_vtt("from the page")
        } else {
            http_server::watch_page(&[("en", true)])
        }
    })
    .await;
    let api = TranscriptApi::new(Duration::from_secs(5), "subgrab-tests").with_base_url(base_url);
    let fetcher = FallbackFetcher::new(resolver()).with_primary(Arc::new(api), RetryPolicy::immediate(1));

    let report = fetcher.fetch(&Item::new("abc", "Clip"), &english(), false).await;

    let result = report.into_result().unwrap();
    assert_eq!(result.document.cues[0].text(), "from the page");
    assert!(result.is_auto_generated);
    assert!(!result.used_fallback_source);
    assert_eq!(result.language_used, "en");
}
