//! Rate Limiting Infrastructure
//!
//! Named fixed-window policies and the counter snapshot reported to callers.

use std::borrow::Cow;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Header value used when the count could not be determined
pub const UNKNOWN: HeaderValue = HeaderValue::from_static("unknown");

/// Fixed-window rate limit policy
///
/// The name partitions stored counters, so two policies applied to the same
/// caller never share a count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Policy name (counter namespace)
    pub name: Cow<'static, str>,
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl RateLimitPolicy {
    /// Lenient policy for read endpoints: 100 requests per 15 minutes
    pub fn read() -> Self {
        Self::preset("read", 100, Duration::from_secs(15 * 60))
    }

    /// Policy for write/mutation endpoints: 30 requests per 15 minutes
    pub fn write() -> Self {
        Self::preset("write", 30, Duration::from_secs(15 * 60))
    }

    /// Policy for authenticated callers: 120 requests per minute
    pub fn authenticated() -> Self {
        Self::preset("authenticated", 120, Duration::from_secs(60))
    }

    /// Policy for sensitive operations: 3 requests per hour
    pub fn sensitive() -> Self {
        Self::preset("sensitive", 3, Duration::from_secs(3600))
    }

    /// Failed cron authentication attempts: 5 per 15 minutes
    pub fn cron_failures() -> Self {
        Self::preset("cron_failures", 5, Duration::from_secs(15 * 60))
    }

    pub fn custom(name: impl Into<Cow<'static, str>>, max_requests: u32, window: Duration) -> Self {
        Self {
            name: name.into(),
            max_requests,
            window,
        }
    }

    fn preset(name: &'static str, max_requests: u32, window: Duration) -> Self {
        Self::custom(name, max_requests, window)
    }

    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }

    /// Cache staleness bound for this policy
    ///
    /// Never more than half the window, so a cached counter always ages out
    /// well before the window it describes.
    pub fn cache_staleness(&self, cache_ttl: Duration) -> Duration {
        cache_ttl.min(self.window / 2)
    }
}

/// Counter state reported after an admission decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_ms: i64,
}

impl RateLimitSnapshot {
    pub fn new(limit: u32, count: u32, reset_at_ms: i64) -> Self {
        Self {
            limit,
            remaining: limit.saturating_sub(count),
            reset_at_ms,
        }
    }

    /// Reset instant as epoch seconds (`X-RateLimit-Reset`)
    pub fn reset_epoch_secs(&self) -> i64 {
        self.reset_at_ms.div_euclid(1000)
    }

    /// Whole seconds until reset, rounded up, at least 1 (`Retry-After`)
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        let remaining_ms = (self.reset_at_ms - now_ms).max(0) as u64;
        remaining_ms.div_ceil(1000).max(1)
    }

    /// Write the `X-RateLimit-*` headers
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset_epoch_secs()));
    }
}

/// `X-RateLimit-*` headers for a request admitted without a reliable count
pub fn apply_unknown_headers(headers: &mut HeaderMap, limit: u32) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, UNKNOWN);
    headers.insert(X_RATELIMIT_RESET, UNKNOWN);
}
