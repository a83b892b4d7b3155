//! Error types for the API client.
//!
//! Every variant carries the URL (or endpoint) involved so that warnings in
//! the pipeline logs point at the failing request.

use thiserror::Error;

/// Errors returned by [`ApiClient`](super::ApiClient) operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-retryable HTTP error response.
    #[error("HTTP {status} requesting {url}")]
    Status {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Raw Retry-After header, if present.
        retry_after: Option<String>,
        /// Response body (may be empty).
        body: String,
    },

    /// A retryable status persisted past the retry budget.
    #[error("HTTP {status} requesting {url}: gave up after {attempts} attempts")]
    RetriesExhausted {
        /// The URL that kept failing.
        url: String,
        /// Last status seen (0 for transport failures).
        status: u16,
        /// Attempts made, including the first.
        attempts: u32,
    },

    /// Token grant failed.
    #[error("authentication failed: {reason}")]
    Auth {
        /// Human-readable reason.
        reason: String,
    },

    /// Response body was not the JSON shape we expected.
    #[error("invalid response body from {url}: {source}")]
    Decode {
        /// The URL whose body failed to parse.
        url: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Build {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    /// Creates a transport error, promoting timeouts to [`ApiError::Timeout`].
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error without a body.
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
            retry_after: None,
            body: String::new(),
        }
    }

    /// Creates an HTTP status error carrying headers and body context.
    pub fn status_with_details(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::Status {
            url: url.into(),
            status,
            retry_after,
            body: body.into(),
        }
    }

    /// Creates an authentication error.
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    /// Creates a body decoding error.
    pub fn decode(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// HTTP status carried by this error, if any.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::RetriesExhausted { status, .. }
                if *status != 0 =>
            {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Whether the server rejected the request itself (4xx other than 429).
    #[must_use]
    pub fn is_client_rejection(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..500).contains(status) && *status != 429)
    }

    /// Whether this is a 429 response (only produced by single-shot fetches).
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Status { status: 429, .. })
    }

    /// Raw Retry-After header for status errors.
    #[must_use]
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            Self::Status { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }
}

// No `From<reqwest::Error>`: every variant needs the request URL, which the
// source error does not reliably carry. Use the constructor helpers.
