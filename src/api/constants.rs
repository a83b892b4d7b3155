//! Constants for the API client (timeouts, rate limits, endpoints).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (60 seconds; image payloads can be slow).
pub const READ_TIMEOUT_SECS: u64 = 60;

/// Requests allowed inside the short burst window.
pub const BURST_LIMIT: usize = 4;

/// Length of the short burst window.
pub const BURST_WINDOW: Duration = Duration::from_secs(1);

/// Requests allowed inside the sustained window.
pub const SUSTAINED_LIMIT: usize = 100;

/// Length of the sustained window.
pub const SUSTAINED_WINDOW: Duration = Duration::from_secs(60);

/// Delay used for a 429 response that carries no usable Retry-After header.
pub const RATE_LIMIT_FALLBACK_DELAY: Duration = Duration::from_secs(2);

/// Warning threshold for cumulative limiter delay (30 seconds).
pub const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Largest page size the chapter listing endpoint accepts.
pub const MAX_CHAPTER_PAGE_SIZE: u32 = 500;

/// Default API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.mangadex.org";

/// Default OpenID Connect token endpoint for personal API clients.
pub const DEFAULT_TOKEN_URL: &str =
    "https://auth.mangadex.org/realms/mangadex/protocol/openid-connect/token";

/// Default host for cover uploads.
pub const DEFAULT_UPLOADS_BASE_URL: &str = "https://uploads.mangadex.org";

/// Referer sent with image delivery requests.
pub const IMAGE_REFERER: &str = "https://mangadex.org";
