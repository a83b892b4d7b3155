//! Authenticated, rate-limited client for the content API.
//!
//! [`ApiClient`] is created once per process and shared by discovery,
//! acquisition and series-asset fetches. Every request it dispatches first
//! passes the injected [`RateLimiter`], so all callers draw from the same
//! request budget.
//!
//! [`ApiClient::send`] absorbs transient failures (429, 5xx, timeouts) inside
//! a bounded retry loop and performs at most one token refresh per request on
//! a 401. It never hands a retryable status back to the caller.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{REFERER, RETRY_AFTER};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::auth::{Authenticator, Credentials};
use super::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_API_BASE_URL, DEFAULT_TOKEN_URL, IMAGE_REFERER,
    MAX_CHAPTER_PAGE_SIZE, RATE_LIMIT_FALLBACK_DELAY, READ_TIMEOUT_SECS,
};
use super::error::ApiError;
use super::rate_limiter::{RateLimiter, parse_retry_after};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error, classify_status};
use super::types::{AtHome, ChapterPage, Manga, MangaEnvelope, MangaList};
use crate::user_agent;

/// Number of results requested by title search.
const SEARCH_LIMIT: u32 = 10;

/// Construction parameters for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, without trailing slash.
    pub api_base_url: String,
    /// OAuth token endpoint.
    pub token_url: String,
    /// User-Agent sent on every request.
    pub user_agent: String,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Per-read timeout.
    pub read_timeout: Duration,
    /// Authentication material.
    pub credentials: Credentials,
    /// Retry budget and backoff for transient failures.
    pub retry_policy: RetryPolicy,
    /// Wait applied to a 429 without a usable Retry-After header.
    pub rate_limit_fallback: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            user_agent: user_agent::default_user_agent(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            credentials: Credentials::default(),
            retry_policy: RetryPolicy::default(),
            rate_limit_fallback: RATE_LIMIT_FALLBACK_DELAY,
        }
    }
}

/// Shared client for API, image and asset requests.
#[derive(Debug)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    auth: Authenticator,
    rate_limiter: Arc<RateLimiter>,
    retry_policy: RetryPolicy,
    rate_limit_fallback: Duration,
}

impl ApiClient {
    /// Builds the client. No request is sent until the first call.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Build`] if the HTTP client cannot be constructed,
    /// or [`ApiError::InvalidUrl`] if the base URL does not parse.
    #[instrument(level = "debug", skip_all, fields(base_url = %config.api_base_url))]
    pub fn new(config: ClientConfig, rate_limiter: Arc<RateLimiter>) -> Result<Self, ApiError> {
        let base_url = config.api_base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|_| ApiError::invalid_url(&base_url))?;

        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .gzip(true)
            .build()
            .map_err(|source| ApiError::Build { source })?;

        if config.credentials.is_anonymous() {
            info!("no credentials configured, using anonymous access");
        }

        let auth = Authenticator::new(
            config.credentials,
            config.token_url,
            http.clone(),
            Arc::clone(&rate_limiter),
        );

        Ok(Self {
            http,
            base_url,
            auth,
            rate_limiter,
            retry_policy: config.retry_policy,
            rate_limit_fallback: config.rate_limit_fallback,
        })
    }

    /// The shared limiter every request passes through.
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// API root this client targets.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Searches titles by name (first 10 matches).
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails or the body is malformed.
    #[instrument(skip(self))]
    pub async fn search_manga(&self, title: &str) -> Result<MangaList, ApiError> {
        let mut url = self.endpoint("manga")?;
        url.query_pairs_mut()
            .append_pair("title", title)
            .append_pair("limit", &SEARCH_LIMIT.to_string());
        self.get_json(&url).await
    }

    /// Fetches a title with its cover art, authors and artists expanded.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails or the body is malformed.
    #[instrument(skip(self))]
    pub async fn get_manga(&self, manga_id: &str) -> Result<Manga, ApiError> {
        let mut url = self.endpoint(&format!("manga/{manga_id}"))?;
        url.query_pairs_mut()
            .append_pair("includes[]", "cover_art")
            .append_pair("includes[]", "author")
            .append_pair("includes[]", "artist");
        let envelope: MangaEnvelope = self.get_json(&url).await?;
        Ok(envelope.data)
    }

    /// Fetches one page of a title's chapters in one language, ordered by
    /// ascending chapter number. `limit` is clamped to `1..=500`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails or the body is malformed.
    #[instrument(skip(self))]
    pub async fn get_chapter_page(
        &self,
        manga_id: &str,
        language: &str,
        limit: u32,
        offset: u64,
    ) -> Result<ChapterPage, ApiError> {
        let limit = limit.clamp(1, MAX_CHAPTER_PAGE_SIZE);
        let mut url = self.endpoint("chapter")?;
        url.query_pairs_mut()
            .append_pair("manga", manga_id)
            .append_pair("translatedLanguage[]", language)
            .append_pair("order[chapter]", "asc")
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        self.get_json(&url).await
    }

    /// Resolves the delivery host and image listing for a chapter.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the request fails or the body is malformed.
    #[instrument(skip(self))]
    pub async fn get_at_home(&self, chapter_id: &str) -> Result<AtHome, ApiError> {
        let url = self.endpoint(&format!("at-home/server/{chapter_id}"))?;
        self.get_json(&url).await
    }

    /// Fetches one image from a delivery host: a single limiter-gated attempt
    /// with the site referrer and no bearer token. Retrying is the caller's
    /// decision.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] (carrying any Retry-After header) for a
    /// non-2xx answer, or a transport error.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let parsed = Url::parse(url).map_err(|_| ApiError::invalid_url(url))?;
        self.rate_limiter.acquire().await;
        let response = self
            .http
            .get(parsed)
            .header(REFERER, IMAGE_REFERER)
            .send()
            .await
            .map_err(|e| ApiError::transport(url, e))?;

        if !response.status().is_success() {
            return Err(status_error(url, response).await);
        }
        read_bytes(url, response).await
    }

    /// Fetches a static asset (cover art) through the full retry loop,
    /// without credentials.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] once retries are exhausted or on a permanent failure.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let parsed = Url::parse(url).map_err(|_| ApiError::invalid_url(url))?;
        let response = self.send(&parsed, false).await?;
        read_bytes(url, response).await
    }

    /// Sends a GET, absorbing transient failures.
    ///
    /// - 429: waits for Retry-After (or the fallback delay), then retries.
    /// - 5xx, 408, timeouts, connection errors: exponential backoff, then retries.
    /// - 401 on an authenticated request: one refresh grant, then one retry.
    /// - anything else non-2xx: [`ApiError::Status`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::RetriesExhausted`] once the retry budget is spent,
    /// [`ApiError::Auth`] when the initial grant fails, or the permanent
    /// failure otherwise.
    #[instrument(level = "debug", skip(self, url), fields(url = %url))]
    pub async fn send(&self, url: &Url, authenticated: bool) -> Result<Response, ApiError> {
        let mut attempt: u32 = 1;
        let mut refreshed = false;

        loop {
            let bearer = if authenticated {
                self.auth.bearer().await?
            } else {
                None
            };

            self.rate_limiter.acquire().await;
            let mut request = self.http.get(url.clone());
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            let (error, last_status) = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(status = response.status().as_u16(), attempt, "request succeeded");
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    match classify_status(status) {
                        FailureType::NeedsAuth if authenticated && !refreshed => {
                            refreshed = true;
                            if self.auth.refresh().await? {
                                debug!("token refreshed, retrying request once");
                                continue;
                            }
                            return Err(status_error(url.as_str(), response).await);
                        }
                        FailureType::RateLimited => {
                            let delay = response
                                .headers()
                                .get(RETRY_AFTER)
                                .and_then(|v| v.to_str().ok())
                                .and_then(parse_retry_after)
                                .unwrap_or(self.rate_limit_fallback);
                            if attempt >= self.retry_policy.max_attempts() {
                                return Err(self.exhausted(url, status, attempt));
                            }
                            info!(
                                attempt,
                                delay_ms = delay.as_millis(),
                                "rate limited by server, waiting before retry"
                            );
                            self.rate_limiter.record_rate_limit(delay);
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            continue;
                        }
                        FailureType::Transient => {
                            (ApiError::status(url.as_str(), status), status)
                        }
                        FailureType::NeedsAuth | FailureType::Permanent => {
                            return Err(status_error(url.as_str(), response).await);
                        }
                    }
                }
                Err(source) if source.is_builder() => {
                    return Err(ApiError::invalid_url(url.as_str()));
                }
                Err(source) => (ApiError::transport(url.as_str(), source), 0),
            };

            match self.retry_policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(
                        error = %error,
                        attempt,
                        delay_ms = delay.as_millis(),
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, "giving up on request");
                    if classify_error(&error) == FailureType::Transient {
                        return Err(self.exhausted(url, last_status, attempt));
                    }
                    return Err(error);
                }
            }
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let raw = format!("{}/{path}", self.base_url);
        Url::parse(&raw).map_err(|_| ApiError::invalid_url(raw))
    }

    fn exhausted(&self, url: &Url, status: u16, attempts: u32) -> ApiError {
        warn!(url = %url, status, attempts, "retry budget exhausted");
        ApiError::RetriesExhausted {
            url: url.to_string(),
            status,
            attempts,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ApiError> {
        let response = self.send(url, true).await?;
        let bytes = read_bytes(url.as_str(), response).await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::decode(url.as_str(), e))
    }
}

async fn read_bytes(url: &str, response: Response) -> Result<Vec<u8>, ApiError> {
    response
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|e| ApiError::transport(url, e))
}

/// Converts a non-2xx response into [`ApiError::Status`], keeping the body and
/// any Retry-After header for the caller.
async fn status_error(url: &str, response: Response) -> ApiError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let body = response.text().await.unwrap_or_default();
    ApiError::status_with_details(url, status, retry_after, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.rate_limit_fallback, Duration::from_secs(2));
        assert_eq!(config.retry_policy.max_attempts(), 8);
        assert!(config.credentials.is_anonymous());
    }

    #[test]
    fn test_new_rejects_unparseable_base_url() {
        let config = ClientConfig {
            api_base_url: "not a url".to_string(),
            ..ClientConfig::default()
        };
        let result = ApiClient::new(config, Arc::new(RateLimiter::disabled()));
        assert!(matches!(result, Err(ApiError::InvalidUrl { .. })));
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = ClientConfig {
            api_base_url: "https://api.example.org/".to_string(),
            ..ClientConfig::default()
        };
        let client = ApiClient::new(config, Arc::new(RateLimiter::disabled()));
        let Ok(client) = client else {
            panic!("client should build");
        };
        let url = client.endpoint("chapter").map(|u| u.to_string());
        assert_eq!(url.ok().as_deref(), Some("https://api.example.org/chapter"));
    }
}
