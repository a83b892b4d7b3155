//! Dual-window rate limiting for every request the client dispatches.
//!
//! This module provides the [`RateLimiter`] struct which holds two independent
//! sliding windows: a short burst window (requests per second) and a longer
//! sustained window (requests per minute). A request proceeds only once both
//! windows have room, and its dispatch instant is then recorded in both.
//!
//! # Overview
//!
//! Permits are never refunded: a request that fails still occupies its slot
//! until the window slides past it. All callers (chapter listing, image
//! fetches, cover downloads) share one limiter, so a burst from one subsystem
//! throttles all others.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use mangadl_core::api::RateLimiter;
//!
//! # async fn example() {
//! // 4 requests per second and 100 per minute
//! let limiter = Arc::new(RateLimiter::new(4, Duration::from_secs(1), 100, Duration::from_secs(60)));
//!
//! // First four requests proceed immediately, the fifth waits for the burst window
//! for _ in 0..5 {
//!     limiter.acquire().await;
//! }
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::{
    BURST_LIMIT, BURST_WINDOW, CUMULATIVE_DELAY_WARNING_THRESHOLD, MAX_RETRY_AFTER,
    SUSTAINED_LIMIT, SUSTAINED_WINDOW,
};

/// Shared rate limiter for API and delivery requests.
///
/// Designed to be wrapped in `Arc` and injected into every collaborator that
/// talks to the remote service.
///
/// # Thread Safety
///
/// `RateLimiter` is `Send + Sync`. Each window is guarded by a
/// `tokio::sync::Mutex`; the burst lock is always taken while the sustained
/// lock is held, never the other way round.
#[derive(Debug)]
pub struct RateLimiter {
    /// Short window (e.g. 4 requests / second).
    burst: SlidingWindow,

    /// Long window (e.g. 100 requests / minute).
    sustained: SlidingWindow,

    /// Whether rate limiting is disabled (tests, local mirrors).
    disabled: bool,

    /// Total time callers spent waiting in `acquire` or on server delays (ms).
    cumulative_delay_ms: AtomicU64,
}

/// A sliding log of dispatch instants bounded by `capacity` per `period`.
#[derive(Debug)]
struct SlidingWindow {
    capacity: usize,
    period: Duration,
    dispatched: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
    fn new(capacity: usize, period: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            period,
            dispatched: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns how long the caller must wait before the window has room.
    fn wait_needed(&self, log: &mut VecDeque<Instant>, now: Instant) -> Option<Duration> {
        while log
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= self.period)
        {
            log.pop_front();
        }
        if log.len() < self.capacity {
            return None;
        }
        log.front()
            .map(|oldest| (*oldest + self.period).saturating_duration_since(now))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(BURST_LIMIT, BURST_WINDOW, SUSTAINED_LIMIT, SUSTAINED_WINDOW)
    }
}

impl RateLimiter {
    /// Creates a limiter with explicit burst and sustained windows.
    ///
    /// # Arguments
    ///
    /// * `burst_limit` / `burst_window` - Requests allowed per short window
    /// * `sustained_limit` / `sustained_window` - Requests allowed per long window
    #[must_use]
    #[instrument(skip_all, fields(burst_limit, sustained_limit))]
    pub fn new(
        burst_limit: usize,
        burst_window: Duration,
        sustained_limit: usize,
        sustained_window: Duration,
    ) -> Self {
        debug!(
            burst_limit,
            burst_window_ms = burst_window.as_millis(),
            sustained_limit,
            sustained_window_ms = sustained_window.as_millis(),
            "creating rate limiter"
        );
        Self {
            burst: SlidingWindow::new(burst_limit, burst_window),
            sustained: SlidingWindow::new(sustained_limit, sustained_window),
            disabled: false,
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    /// Creates a disabled rate limiter that applies no delays.
    #[must_use]
    pub fn disabled() -> Self {
        debug!("creating disabled rate limiter");
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    /// Returns whether rate limiting is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns total delay recorded so far.
    #[must_use]
    pub fn cumulative_delay(&self) -> Duration {
        Duration::from_millis(self.cumulative_delay_ms.load(Ordering::SeqCst))
    }

    /// Waits until both windows admit one more request, then records it.
    ///
    /// The sustained window is checked first and its lock held while the
    /// burst window is consulted, so concurrent callers queue in order.
    #[instrument(level = "trace", skip(self))]
    pub async fn acquire(&self) {
        if self.disabled {
            return;
        }

        let mut sustained = self.sustained.dispatched.lock().await;
        loop {
            let now = Instant::now();
            match self.sustained.wait_needed(&mut sustained, now) {
                Some(delay) => self.sleep_recorded(delay, "sustained").await,
                None => break,
            }
        }

        let mut burst = self.burst.dispatched.lock().await;
        loop {
            let now = Instant::now();
            match self.burst.wait_needed(&mut burst, now) {
                Some(delay) => self.sleep_recorded(delay, "burst").await,
                None => break,
            }
        }

        let now = Instant::now();
        burst.push_back(now);
        sustained.push_back(now);
    }

    /// Records a server-mandated delay (from a Retry-After header).
    ///
    /// The caller performs the actual sleep; this only feeds the cumulative
    /// delay warning so sustained throttling shows up in the logs.
    #[instrument(level = "debug", skip(self))]
    pub fn record_rate_limit(&self, delay: Duration) {
        let cumulative = self.add_cumulative_delay(delay);
        debug!(
            delay_ms = delay.as_millis(),
            cumulative_ms = cumulative.as_millis(),
            "recorded server rate limit"
        );
        if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
            warn!(
                cumulative_delay_secs = cumulative.as_secs(),
                "excessive server rate limiting - upstream may be under heavy load"
            );
        }
    }

    async fn sleep_recorded(&self, delay: Duration, window: &'static str) {
        let cumulative = self.add_cumulative_delay(delay);
        debug!(
            window,
            delay_ms = delay.as_millis(),
            cumulative_ms = cumulative.as_millis(),
            "applying rate limit delay"
        );
        if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
            warn!(
                window,
                cumulative_delay_secs = cumulative.as_secs(),
                "excessive rate limiting - consider reducing request volume"
            );
        }
        tokio::time::sleep(delay).await;
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let new_total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(new_total)
    }
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports two formats as per RFC 7231:
/// - Integer seconds: `Retry-After: 120`
/// - HTTP-date: `Retry-After: Wed, 21 Oct 2025 07:28:00 GMT`
///
/// Returns `None` if the value cannot be parsed. Caps excessive values at 1 hour.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use mangadl_core::api::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument(level = "trace")]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        if duration > MAX_RETRY_AFTER {
            warn!(
                seconds,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }
        return Some(duration);
    }

    // Some gateways send fractional seconds
    if let Ok(seconds) = header_value.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            return None;
        }
        if seconds >= MAX_RETRY_AFTER.as_secs_f64() {
            warn!(
                header_value,
                max_seconds = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds maximum, capping at 1 hour"
            );
            return Some(MAX_RETRY_AFTER);
        }
        return Some(Duration::from_secs_f64(seconds));
    }

    let Ok(datetime) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };
    match datetime.duration_since(std::time::SystemTime::now()) {
        Ok(duration) => Some(duration.min(MAX_RETRY_AFTER)),
        Err(_) => {
            debug!(header_value, "Retry-After date is in the past, returning zero");
            Some(Duration::ZERO)
        }
    }
}
