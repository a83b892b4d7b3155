//! Client for the remote content API.
//!
//! This module owns everything that talks to the upstream service: the shared
//! [`RateLimiter`], the bounded [`RetryPolicy`], token handling in
//! [`Authenticator`], and the typed endpoints on [`ApiClient`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mangadl_core::api::{ApiClient, ClientConfig, RateLimiter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = Arc::new(RateLimiter::default());
//! let client = ApiClient::new(ClientConfig::default(), limiter)?;
//! let page = client.get_chapter_page("a1c7c817-4e59-43b7-9365-09675a149a6f", "en", 100, 0).await?;
//! println!("{} chapters available", page.total);
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
pub mod constants;
mod error;
pub mod rate_limiter;
mod retry;
pub mod types;

pub use auth::{Authenticator, Credentials};
pub use client::{ApiClient, ClientConfig};
pub use error::ApiError;
pub use rate_limiter::{RateLimiter, parse_retry_after};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error, classify_status,
};
