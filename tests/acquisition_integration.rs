//! Integration tests for per-chapter image acquisition: tier selection,
//! retries, throttling and the reduced-tier breaker.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use mangadl_core::download::{ChapterFetch, ImageFetcher, ImageTier};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;
use support::{at_home_json, fast_client, fast_fetch, page_files, png_page};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        mock_server
    }};
}

async fn mount_at_home(server: &MockServer, chapter_id: &str, full: &[String], reduced: &[String]) {
    Mock::given(method("GET"))
        .and(path(format!("/at-home/server/{chapter_id}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(at_home_json(&server.uri(), "h", full, reduced)),
        )
        .mount(server)
        .await;
}

async fn mount_images(server: &MockServer, tier: &str, files: &[String]) {
    for file in files {
        Mock::given(method("GET"))
            .and(path(format!("/{tier}/h/{file}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_page()))
            .mount(server)
            .await;
    }
}

async fn requests_under(server: &MockServer, prefix: &str) -> usize {
    server
        .received_requests()
        .await
        .expect("recording on")
        .iter()
        .filter(|r| r.url.path().starts_with(prefix))
        .count()
}

#[tokio::test]
async fn test_preferred_tier_all_images_in_order() {
    let mock_server = require_mock_server!();
    let files = page_files(3);
    mount_at_home(&mock_server, "c-1", &files, &[]).await;
    mount_images(&mock_server, "data", &files).await;

    let fetcher = ImageFetcher::new(fast_client(&mock_server.uri()), fast_fetch(false));
    let fetch = fetcher.fetch_chapter("c-1").await;

    let ChapterFetch::Images { tier, images, errors } = fetch else {
        panic!("expected images, got {fetch:?}");
    };
    assert_eq!(tier, ImageTier::Full);
    assert_eq!(images.len(), 3);
    assert_eq!(errors, 0);
}

#[tokio::test]
async fn test_empty_reduced_tier_uses_full_without_error() {
    let mock_server = require_mock_server!();
    let files = page_files(2);
    mount_at_home(&mock_server, "c-1", &files, &[]).await;
    mount_images(&mock_server, "data", &files).await;

    let fetcher = ImageFetcher::new(fast_client(&mock_server.uri()), fast_fetch(true));
    let fetch = fetcher.fetch_chapter("c-1").await;

    assert!(
        matches!(&fetch, ChapterFetch::Images { tier: ImageTier::Full, images, errors: 0 } if images.len() == 2),
        "unexpected outcome: {fetch:?}"
    );
}

#[tokio::test]
async fn test_rejected_reduced_tier_falls_back_and_drops_its_errors() {
    let mock_server = require_mock_server!();
    let full = page_files(2);
    let reduced = page_files(8);
    mount_at_home(&mock_server, "c-1", &full, &reduced).await;
    mount_images(&mock_server, "data", &full).await;
    Mock::given(method("GET"))
        .and(path_regex("^/data-saver/"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&mock_server)
        .await;

    let fetcher = ImageFetcher::new(fast_client(&mock_server.uri()), fast_fetch(true));
    let fetch = fetcher.fetch_chapter("c-1").await;

    assert!(
        matches!(&fetch, ChapterFetch::Images { tier: ImageTier::Full, images, errors: 0 } if images.len() == 2),
        "unexpected outcome: {fetch:?}"
    );
    // Five images, three attempts each; the remaining three are never requested.
    assert_eq!(requests_under(&mock_server, "/data-saver/").await, 15);
}

#[tokio::test]
async fn test_breaker_disarmed_without_full_tier() {
    let mock_server = require_mock_server!();
    let reduced = page_files(6);
    mount_at_home(&mock_server, "c-1", &[], &reduced).await;
    Mock::given(method("GET"))
        .and(path_regex("^/data-saver/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let fetcher = ImageFetcher::new(fast_client(&mock_server.uri()), fast_fetch(true));
    let fetch = fetcher.fetch_chapter("c-1").await;

    assert_eq!(fetch, ChapterFetch::NothingFetched { errors: 6 });
    assert_eq!(requests_under(&mock_server, "/data-saver/").await, 18);
}

#[tokio::test]
async fn test_partial_chapter_keeps_subset_and_counts_errors() {
    let mock_server = require_mock_server!();
    let files = page_files(3);
    mount_at_home(&mock_server, "c-1", &files, &[]).await;
    mount_images(&mock_server, "data", &[files[0].clone(), files[2].clone()]).await;
    Mock::given(method("GET"))
        .and(path("/data/h/p2.png"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let fetcher = ImageFetcher::new(fast_client(&mock_server.uri()), fast_fetch(false));
    let fetch = fetcher.fetch_chapter("c-1").await;

    assert!(
        matches!(&fetch, ChapterFetch::Images { images, errors: 1, .. } if images.len() == 2),
        "unexpected outcome: {fetch:?}"
    );
}

/// Throttles the first `throttled` requests, then serves a page.
struct Throttled {
    calls: Arc<AtomicUsize>,
    throttled: usize,
}

impl Respond for Throttled {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.throttled {
            ResponseTemplate::new(429).insert_header("Retry-After", "0")
        } else {
            ResponseTemplate::new(200).set_body_bytes(png_page())
        }
    }
}

#[tokio::test]
async fn test_throttled_image_does_not_consume_attempts() {
    let mock_server = require_mock_server!();
    let files = page_files(1);
    mount_at_home(&mock_server, "c-1", &files, &[]).await;
    let calls = Arc::new(AtomicUsize::new(0));
    Mock::given(method("GET"))
        .and(path("/data/h/p1.png"))
        .respond_with(Throttled {
            calls: Arc::clone(&calls),
            throttled: 5,
        })
        .mount(&mock_server)
        .await;

    let fetcher = ImageFetcher::new(fast_client(&mock_server.uri()), fast_fetch(false));
    let fetch = fetcher.fetch_chapter("c-1").await;

    assert!(
        matches!(&fetch, ChapterFetch::Images { errors: 0, .. }),
        "unexpected outcome: {fetch:?}"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_throttle_leniency_is_bounded() {
    let mock_server = require_mock_server!();
    let files = page_files(1);
    mount_at_home(&mock_server, "c-1", &files, &[]).await;
    Mock::given(method("GET"))
        .and(path("/data/h/p1.png"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .mount(&mock_server)
        .await;

    let mut settings = fast_fetch(false);
    settings.max_throttle_waits_per_image = 2;
    let fetcher = ImageFetcher::new(fast_client(&mock_server.uri()), settings);
    let fetch = fetcher.fetch_chapter("c-1").await;

    assert_eq!(fetch, ChapterFetch::NothingFetched { errors: 1 });
    // Two free waits, then three counted attempts.
    assert_eq!(requests_under(&mock_server, "/data/").await, 5);
}

#[tokio::test]
async fn test_resolution_failure_is_no_source_with_one_error() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/at-home/server/c-1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let fetcher = ImageFetcher::new(fast_client(&mock_server.uri()), fast_fetch(false));
    assert_eq!(
        fetcher.fetch_chapter("c-1").await,
        ChapterFetch::NoSource { errors: 1 }
    );
}

#[tokio::test]
async fn test_missing_hash_is_no_source_without_error() {
    let mock_server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/at-home/server/c-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "baseUrl": mock_server.uri(),
            "chapter": {"data": ["p1.png"], "dataSaver": []}
        })))
        .mount(&mock_server)
        .await;

    let fetcher = ImageFetcher::new(fast_client(&mock_server.uri()), fast_fetch(false));
    assert_eq!(
        fetcher.fetch_chapter("c-1").await,
        ChapterFetch::NoSource { errors: 0 }
    );
}
