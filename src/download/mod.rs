//! Chapter image acquisition.
//!
//! # Features
//!
//! - Two quality tiers with transparent substitution when one is empty
//! - Bounded per-image retry, with lenient but bounded 429 handling
//! - Consecutive-rejection breaker on the reduced tier
//! - Whole-chapter fallback from reduced to full quality
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mangadl_core::api::{ApiClient, ClientConfig, RateLimiter};
//! use mangadl_core::download::{ChapterFetch, FetchSettings, ImageFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(ApiClient::new(ClientConfig::default(), Arc::new(RateLimiter::default()))?);
//! let fetcher = ImageFetcher::new(client, FetchSettings::default());
//! if let ChapterFetch::Images { images, .. } = fetcher.fetch_chapter("chapter-id").await {
//!     println!("fetched {} pages", images.len());
//! }
//! # Ok(())
//! # }
//! ```

mod images;
mod source;

pub use images::{
    ChapterFetch, DEFAULT_IMAGE_RETRY_DELAY, DEFAULT_MAX_ATTEMPTS_PER_IMAGE,
    DEFAULT_MAX_THROTTLE_WAITS, DEFAULT_REJECTION_THRESHOLD, FetchSettings, ImageFetcher,
};
pub use source::{ImageSource, ImageTier};
