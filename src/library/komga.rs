//! Komga library scan trigger.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::{LibraryNotifier, ScanOutcome, SkipReason};

/// Minimum time between two triggered scans.
pub const SCAN_DEBOUNCE: Duration = Duration::from_secs(30);

/// Request timeout for the scan endpoint.
const SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection details for a Komga server.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct KomgaConfig {
    /// Server root, e.g. `http://komga:25600`.
    pub base_url: Option<String>,
    /// Library to rescan.
    pub library_id: Option<String>,
    /// API token.
    pub token: Option<String>,
}

impl std::fmt::Debug for KomgaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KomgaConfig")
            .field("base_url", &self.base_url)
            .field("library_id", &self.library_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl KomgaConfig {
    /// Whether every field needed to trigger a scan is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.base_url.is_some() && self.library_id.is_some() && self.token.is_some()
    }
}

/// Triggers Komga library scans, at most once per debounce window.
#[derive(Debug)]
pub struct KomgaNotifier {
    http: Client,
    config: KomgaConfig,
    debounce: Duration,
    last_scan: Mutex<Option<Instant>>,
}

impl KomgaNotifier {
    /// Creates a notifier with the default 30-second debounce.
    #[must_use]
    pub fn new(http: Client, config: KomgaConfig) -> Self {
        Self::with_debounce(http, config, SCAN_DEBOUNCE)
    }

    /// Creates a notifier with an explicit debounce window.
    #[must_use]
    pub fn with_debounce(http: Client, config: KomgaConfig, debounce: Duration) -> Self {
        Self {
            http,
            config,
            debounce,
            last_scan: Mutex::new(None),
        }
    }
}

#[async_trait]
impl LibraryNotifier for KomgaNotifier {
    #[instrument(skip(self))]
    async fn trigger_scan(&self) -> ScanOutcome {
        let (Some(base_url), Some(library_id), Some(token)) = (
            self.config.base_url.as_deref(),
            self.config.library_id.as_deref(),
            self.config.token.as_deref(),
        ) else {
            debug!("library scan skipped: missing configuration");
            return ScanOutcome::Skipped {
                reason: SkipReason::MissingConfig,
            };
        };

        let mut last_scan = self.last_scan.lock().await;
        let now = Instant::now();
        if (*last_scan).is_some_and(|at| now.duration_since(at) < self.debounce) {
            debug!("library scan skipped: debounced");
            return ScanOutcome::Skipped {
                reason: SkipReason::Debounced,
            };
        }

        let url = format!(
            "{}/api/v1/libraries/{library_id}/scan",
            base_url.trim_end_matches('/')
        );
        match self
            .http
            .post(&url)
            .bearer_auth(token)
            .timeout(SCAN_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().as_u16() == 202 => {
                *last_scan = Some(now);
                info!(library_id, "library scan triggered");
                ScanOutcome::Triggered
            }
            Ok(response) => {
                let status = response.status().as_u16();
                warn!(status, "library scan request refused");
                ScanOutcome::Failed { status }
            }
            Err(error) => {
                warn!(error = %error, "library scan request failed");
                ScanOutcome::Error {
                    error: error.to_string(),
                }
            }
        }
    }
}
