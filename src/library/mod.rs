//! Integration with the downstream comics library.
//!
//! Two concerns live here:
//!
//! - [`SeriesAssets`] writes `cover.jpg` and `series.json` beside a title's
//!   archives, each only if absent.
//! - [`LibraryNotifier`] asks the library server to rescan after new archives
//!   land. [`KomgaNotifier`] talks to Komga; [`NoopNotifier`] is used when no
//!   server is configured.

mod komga;
mod series;

use async_trait::async_trait;
use serde::Serialize;

pub use komga::{KomgaConfig, KomgaNotifier, SCAN_DEBOUNCE};
pub use series::{AssetsOutcome, COVER_FILE, SERIES_METADATA_FILE, SeriesAssets, SeriesMetadata};

/// Why a scan request was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Base URL, library id or token missing.
    MissingConfig,
    /// A scan was triggered less than the debounce window ago.
    Debounced,
}

/// Outcome of a scan trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scan", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// The server accepted the scan.
    Triggered,
    /// Nothing was sent.
    Skipped {
        /// Why.
        reason: SkipReason,
    },
    /// The server answered with an unexpected status.
    Failed {
        /// HTTP status code.
        status: u16,
    },
    /// The request could not be sent.
    Error {
        /// Transport error description.
        error: String,
    },
}

/// Requests a library rescan. Delivery is best-effort: callers log the
/// outcome and carry on.
#[async_trait]
pub trait LibraryNotifier: Send + Sync {
    /// Triggers a scan of the configured library.
    async fn trigger_scan(&self) -> ScanOutcome;
}

/// Notifier for setups without a library server.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl LibraryNotifier for NoopNotifier {
    async fn trigger_scan(&self) -> ScanOutcome {
        ScanOutcome::Skipped {
            reason: SkipReason::MissingConfig,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_notifier_skips() {
        assert_eq!(
            NoopNotifier.trigger_scan().await,
            ScanOutcome::Skipped {
                reason: SkipReason::MissingConfig
            }
        );
    }

    #[test]
    fn test_scan_outcome_serializes_tagged() {
        let json = serde_json::to_value(ScanOutcome::Skipped {
            reason: SkipReason::Debounced,
        })
        .unwrap_or_default();
        assert_eq!(json["scan"], "skipped");
        assert_eq!(json["reason"], "debounced");

        let json = serde_json::to_value(ScanOutcome::Failed { status: 500 }).unwrap_or_default();
        assert_eq!(json["scan"], "failed");
        assert_eq!(json["status"], 500);
    }
}
