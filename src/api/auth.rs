//! Token acquisition and refresh against the OAuth token endpoint.
//!
//! The authenticator supports three modes, chosen from the configured
//! [`Credentials`]:
//!
//! - a long-lived access token, used verbatim
//! - a password grant (username, password, client id and secret), exchanged
//!   lazily on first use for an access/refresh pair
//! - anonymous access when nothing is configured
//!
//! Token requests pass through the shared [`RateLimiter`] like every other
//! outbound request.

use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::error::ApiError;
use super::rate_limiter::RateLimiter;
use super::types::TokenResponse;

/// Configured credentials. Any subset may be present.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Long-lived access token (takes precedence over the password grant).
    pub token: Option<String>,
    /// Account user name.
    pub username: Option<String>,
    /// Account password.
    pub password: Option<String>,
    /// Personal API client id.
    pub client_id: Option<String>,
    /// Personal API client secret.
    pub client_secret: Option<String>,
}

impl Credentials {
    /// Whether all four password-grant fields are present.
    #[must_use]
    pub fn has_password_grant(&self) -> bool {
        self.username.is_some()
            && self.password.is_some()
            && self.client_id.is_some()
            && self.client_secret.is_some()
    }

    /// Whether no authentication is configured at all.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.token.is_none() && !self.has_password_grant()
    }
}

// Secrets never reach logs through Debug.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("token", &mask(&self.token))
            .field("username", &self.username)
            .field("password", &mask(&self.password))
            .field("client_id", &self.client_id)
            .field("client_secret", &mask(&self.client_secret))
            .finish()
    }
}

#[derive(Debug, Default)]
struct TokenState {
    access: Option<String>,
    refresh: Option<String>,
}

/// Holds the current token pair and performs grants on demand.
#[derive(Debug)]
pub struct Authenticator {
    credentials: Credentials,
    token_url: String,
    http: Client,
    rate_limiter: Arc<RateLimiter>,
    state: Mutex<TokenState>,
}

impl Authenticator {
    /// Creates an authenticator. No network traffic happens until the first
    /// call to [`bearer`](Self::bearer).
    #[must_use]
    pub fn new(
        credentials: Credentials,
        token_url: impl Into<String>,
        http: Client,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        let state = TokenState {
            access: credentials.token.clone(),
            refresh: None,
        };
        Self {
            credentials,
            token_url: token_url.into(),
            http,
            rate_limiter,
            state: Mutex::new(state),
        }
    }

    /// Returns the access token to attach, performing the password grant if
    /// no token is held yet. `None` means anonymous access.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] when the password grant is rejected.
    #[instrument(level = "debug", skip(self))]
    pub async fn bearer(&self) -> Result<Option<String>, ApiError> {
        let mut state = self.state.lock().await;
        if let Some(access) = &state.access {
            return Ok(Some(access.clone()));
        }
        let (Some(username), Some(password), Some(client_id), Some(client_secret)) = (
            self.credentials.username.as_deref(),
            self.credentials.password.as_deref(),
            self.credentials.client_id.as_deref(),
            self.credentials.client_secret.as_deref(),
        ) else {
            return Ok(None);
        };

        let body = {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            form.append_pair("grant_type", "password")
                .append_pair("username", username)
                .append_pair("password", password)
                .append_pair("client_id", client_id)
                .append_pair("client_secret", client_secret);
            form.finish()
        };

        let token = self
            .grant(body)
            .await?
            .ok_or_else(|| ApiError::auth("password grant rejected by token endpoint"))?;

        info!("auth success: password grant");
        state.access = Some(token.access_token.clone());
        state.refresh = token.refresh_token;
        Ok(Some(token.access_token))
    }

    /// Exchanges the held refresh token for a new access token.
    ///
    /// Returns `Ok(true)` when a fresh access token is now held, `Ok(false)`
    /// when no refresh is possible or the endpoint declined.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the token endpoint could not be reached.
    #[instrument(level = "debug", skip(self))]
    pub async fn refresh(&self) -> Result<bool, ApiError> {
        let mut state = self.state.lock().await;
        let (Some(refresh_token), Some(client_id)) = (
            state.refresh.clone(),
            self.credentials.client_id.as_deref(),
        ) else {
            debug!("no refresh token held, cannot refresh");
            return Ok(false);
        };

        // The serializer is not Send; it must be gone before the await.
        let body = {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            form.append_pair("grant_type", "refresh_token")
                .append_pair("refresh_token", &refresh_token)
                .append_pair("client_id", client_id);
            if let Some(secret) = self.credentials.client_secret.as_deref() {
                form.append_pair("client_secret", secret);
            }
            form.finish()
        };

        match self.grant(body).await? {
            Some(token) => {
                info!("auth success: refresh grant");
                state.access = Some(token.access_token);
                if token.refresh_token.is_some() {
                    state.refresh = token.refresh_token;
                }
                Ok(true)
            }
            None => {
                warn!("refresh grant rejected");
                Ok(false)
            }
        }
    }

    /// Posts a form-encoded grant. `Ok(None)` for a non-2xx answer.
    async fn grant(&self, body: String) -> Result<Option<TokenResponse>, ApiError> {
        self.rate_limiter.acquire().await;
        let response = self
            .http
            .post(&self.token_url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| ApiError::transport(&self.token_url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "token endpoint declined grant");
            return Ok(None);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::transport(&self.token_url, e))?;
        serde_json::from_slice::<TokenResponse>(&bytes)
            .map(Some)
            .map_err(|e| ApiError::decode(&self.token_url, e))
    }
}
