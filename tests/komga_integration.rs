//! Integration tests for the Komga scan notifier.

use std::time::Duration;

use mangadl_core::library::{KomgaConfig, KomgaNotifier, LibraryNotifier, ScanOutcome, SkipReason};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        mock_server
    }};
}

fn config(server: &MockServer) -> KomgaConfig {
    KomgaConfig {
        base_url: Some(format!("{}/", server.uri())),
        library_id: Some("lib-1".to_string()),
        token: Some("komga-token".to_string()),
    }
}

async fn mount_scan(server: &MockServer, status: u16, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/libraries/lib-1/scan"))
        .and(header("authorization", "Bearer komga-token"))
        .respond_with(ResponseTemplate::new(status))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_second_scan_within_window_is_debounced() {
    let mock_server = require_mock_server!();
    mount_scan(&mock_server, 202, 1).await;

    let notifier = KomgaNotifier::new(reqwest::Client::new(), config(&mock_server));
    assert_eq!(notifier.trigger_scan().await, ScanOutcome::Triggered);
    assert_eq!(
        notifier.trigger_scan().await,
        ScanOutcome::Skipped {
            reason: SkipReason::Debounced
        }
    );
}

#[tokio::test]
async fn test_scan_allowed_again_after_window() {
    let mock_server = require_mock_server!();
    mount_scan(&mock_server, 202, 2).await;

    let notifier = KomgaNotifier::with_debounce(
        reqwest::Client::new(),
        config(&mock_server),
        Duration::from_millis(20),
    );
    assert_eq!(notifier.trigger_scan().await, ScanOutcome::Triggered);
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(notifier.trigger_scan().await, ScanOutcome::Triggered);
}

#[tokio::test]
async fn test_refused_scan_does_not_start_debounce() {
    let mock_server = require_mock_server!();
    mount_scan(&mock_server, 500, 2).await;

    let notifier = KomgaNotifier::new(reqwest::Client::new(), config(&mock_server));
    assert_eq!(
        notifier.trigger_scan().await,
        ScanOutcome::Failed { status: 500 }
    );
    assert_eq!(
        notifier.trigger_scan().await,
        ScanOutcome::Failed { status: 500 }
    );
}
