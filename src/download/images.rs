//! Per-chapter image acquisition.
//!
//! [`ImageFetcher::fetch_chapter`] resolves a chapter's image source, fetches
//! every image of the selected tier in order, and falls back to the
//! full-quality tier when the reduced-quality pass produced nothing.
//!
//! Per image, up to `max_attempts_per_image` attempts are made. A 429 waits
//! for the server-suggested delay without consuming an attempt, up to
//! `max_throttle_waits_per_image` times. Images that still fail are dropped;
//! the returned sequence has no gaps or placeholders.
//!
//! On the reduced tier, a run of consecutive client rejections (4xx other
//! than 429) abandons the pass early when a full-quality tier exists, since
//! the remaining reduced images are likely to be rejected too.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::source::{ImageSource, ImageTier};
use crate::api::constants::RATE_LIMIT_FALLBACK_DELAY;
use crate::api::{ApiClient, ApiError, parse_retry_after};

/// Attempts per image before it is dropped.
pub const DEFAULT_MAX_ATTEMPTS_PER_IMAGE: u32 = 3;

/// Pause between failed attempts at the same image.
pub const DEFAULT_IMAGE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// 429 waits allowed per image before a 429 counts as a failed attempt.
pub const DEFAULT_MAX_THROTTLE_WAITS: u32 = 10;

/// Consecutive client rejections that abandon a reduced-quality pass.
pub const DEFAULT_REJECTION_THRESHOLD: u32 = 5;

/// Tunables for image acquisition.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Prefer the reduced-quality tier.
    pub prefer_reduced: bool,
    /// Attempts per image, including the first.
    pub max_attempts_per_image: u32,
    /// Pause between failed attempts.
    pub retry_delay: Duration,
    /// Wait applied to a 429 without a usable Retry-After header.
    pub rate_limit_fallback: Duration,
    /// 429 waits per image that do not consume an attempt.
    pub max_throttle_waits_per_image: u32,
    /// Consecutive client rejections that trip the reduced-tier breaker.
    pub rejection_threshold: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            prefer_reduced: false,
            max_attempts_per_image: DEFAULT_MAX_ATTEMPTS_PER_IMAGE,
            retry_delay: DEFAULT_IMAGE_RETRY_DELAY,
            rate_limit_fallback: RATE_LIMIT_FALLBACK_DELAY,
            max_throttle_waits_per_image: DEFAULT_MAX_THROTTLE_WAITS,
            rejection_threshold: DEFAULT_REJECTION_THRESHOLD,
        }
    }
}

impl FetchSettings {
    fn preferred_tier(&self) -> ImageTier {
        if self.prefer_reduced {
            ImageTier::Reduced
        } else {
            ImageTier::Full
        }
    }
}

/// Result of fetching one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterFetch {
    /// At least one image was fetched.
    Images {
        /// Tier the images came from.
        tier: ImageTier,
        /// Image payloads in page order.
        images: Vec<Vec<u8>>,
        /// Images that failed on the tier that succeeded.
        errors: u32,
    },
    /// The chapter could not be resolved to a usable image source.
    NoSource {
        /// 1 when the resolution request itself failed, else 0.
        errors: u32,
    },
    /// Every image failed on every tier tried.
    NothingFetched {
        /// Failed images across all passes.
        errors: u32,
    },
}

impl ChapterFetch {
    /// Error count to credit to the job.
    #[must_use]
    pub fn errors(&self) -> u32 {
        match self {
            Self::Images { errors, .. }
            | Self::NoSource { errors }
            | Self::NothingFetched { errors } => *errors,
        }
    }
}

/// Images and failures from one pass over a single tier.
#[derive(Debug, Default)]
struct TierPass {
    images: Vec<Vec<u8>>,
    errors: u32,
    abandoned: bool,
}

/// Fetches chapter images through the shared [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Arc<ApiClient>,
    settings: FetchSettings,
}

impl ImageFetcher {
    /// Creates a fetcher.
    #[must_use]
    pub fn new(client: Arc<ApiClient>, settings: FetchSettings) -> Self {
        Self { client, settings }
    }

    /// Active settings.
    #[must_use]
    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Resolves and fetches all images of one chapter.
    #[instrument(skip(self))]
    pub async fn fetch_chapter(&self, chapter_id: &str) -> ChapterFetch {
        let at_home = match self.client.get_at_home(chapter_id).await {
            Ok(at_home) => at_home,
            Err(error) => {
                warn!(error = %error, "image source resolution failed");
                return ChapterFetch::NoSource { errors: 1 };
            }
        };

        let Some(source) = ImageSource::from_at_home(at_home) else {
            info!("no delivery host or hash for chapter");
            return ChapterFetch::NoSource { errors: 0 };
        };
        let Some(tier) = source.select(self.settings.preferred_tier()) else {
            info!("no images listed for chapter");
            return ChapterFetch::NoSource { errors: 0 };
        };

        let pass = self.fetch_tier(&source, tier).await;
        debug!(
            %tier,
            fetched = pass.images.len(),
            expected = source.files(tier).len(),
            errors = pass.errors,
            "tier pass finished"
        );

        if !pass.images.is_empty() {
            return ChapterFetch::Images {
                tier,
                images: pass.images,
                errors: pass.errors,
            };
        }

        if tier == ImageTier::Reduced && !source.full.is_empty() {
            info!(
                abandoned = pass.abandoned,
                "reduced-quality pass fetched nothing, retrying chapter with full-quality images"
            );
            let fallback = self.fetch_tier(&source, ImageTier::Full).await;
            if !fallback.images.is_empty() {
                info!(
                    fetched = fallback.images.len(),
                    expected = source.full.len(),
                    "full-quality fallback succeeded"
                );
                return ChapterFetch::Images {
                    tier: ImageTier::Full,
                    images: fallback.images,
                    errors: fallback.errors,
                };
            }
            return ChapterFetch::NothingFetched {
                errors: pass.errors + fallback.errors,
            };
        }

        ChapterFetch::NothingFetched {
            errors: pass.errors,
        }
    }

    async fn fetch_tier(&self, source: &ImageSource, tier: ImageTier) -> TierPass {
        let breaker_armed = tier == ImageTier::Reduced && !source.full.is_empty();
        let mut pass = TierPass::default();
        let mut consecutive_rejections: u32 = 0;

        for file in source.files(tier) {
            let url = source.image_url(tier, file);
            match self.fetch_image(&url).await {
                Ok(bytes) => {
                    pass.images.push(bytes);
                    consecutive_rejections = 0;
                }
                Err(error) => {
                    pass.errors += 1;
                    warn!(
                        %url,
                        error = %error,
                        attempts = self.settings.max_attempts_per_image,
                        "image download failed"
                    );
                    if error.is_client_rejection() {
                        consecutive_rejections += 1;
                    } else {
                        consecutive_rejections = 0;
                    }
                    if breaker_armed && consecutive_rejections >= self.settings.rejection_threshold
                    {
                        warn!(
                            consecutive_rejections,
                            "abandoning reduced-quality pass after consecutive rejections"
                        );
                        pass.abandoned = true;
                        break;
                    }
                }
            }
        }

        pass
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let max_attempts = self.settings.max_attempts_per_image.max(1);
        let mut attempt: u32 = 1;
        let mut throttle_waits: u32 = 0;

        loop {
            match self.client.fetch_image(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(error)
                    if error.is_rate_limited()
                        && throttle_waits < self.settings.max_throttle_waits_per_image =>
                {
                    throttle_waits += 1;
                    let delay = error
                        .retry_after()
                        .and_then(parse_retry_after)
                        .unwrap_or(self.settings.rate_limit_fallback);
                    debug!(throttle_waits, delay_ms = delay.as_millis(), "image throttled");
                    self.client.rate_limiter().record_rate_limit(delay);
                    tokio::time::sleep(delay).await;
                }
                Err(error) if attempt >= max_attempts => return Err(error),
                Err(error) => {
                    debug!(attempt, error = %error, "image attempt failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_settings_defaults() {
        let settings = FetchSettings::default();
        assert!(!settings.prefer_reduced);
        assert_eq!(settings.max_attempts_per_image, 3);
        assert_eq!(settings.retry_delay, Duration::from_secs(1));
        assert_eq!(settings.max_throttle_waits_per_image, 10);
        assert_eq!(settings.rejection_threshold, 5);
        assert_eq!(settings.preferred_tier(), ImageTier::Full);
    }

    #[test]
    fn test_chapter_fetch_error_counts() {
        let images = ChapterFetch::Images {
            tier: ImageTier::Full,
            images: vec![vec![1]],
            errors: 2,
        };
        assert_eq!(images.errors(), 2);
        assert_eq!(ChapterFetch::NoSource { errors: 1 }.errors(), 1);
        assert_eq!(ChapterFetch::NothingFetched { errors: 7 }.errors(), 7);
    }
}
