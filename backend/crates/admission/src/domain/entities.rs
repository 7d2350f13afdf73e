//! Domain Entities

use platform::rate_limit::RateLimitSnapshot;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::RateLimitKey;

/// Fixed window counter for one caller under one policy
///
/// Persisted as one document per `(policy, key)`. A record whose
/// `reset_time_ms` has passed is logically empty no matter what is still
/// stored; it is replaced by a fresh record rather than reset in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    pub policy: String,
    pub key: String,
    pub count: u32,
    #[serde(rename = "resetTime")]
    pub reset_time_ms: i64,
    #[serde(rename = "lastRequest")]
    pub last_request_ms: i64,
}

impl RateLimitRecord {
    /// Empty record whose window starts now
    pub fn fresh(policy: &str, key: &RateLimitKey, now_ms: i64, window_ms: i64) -> Self {
        Self {
            policy: policy.to_string(),
            key: key.as_str().to_string(),
            count: 0,
            reset_time_ms: now_ms + window_ms,
            last_request_ms: now_ms,
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.reset_time_ms
    }

    /// Count one request at `now_ms`
    pub fn record_request(&mut self, now_ms: i64) {
        self.count = self.count.saturating_add(1);
        self.last_request_ms = now_ms;
    }

    pub fn snapshot(&self, limit: u32) -> RateLimitSnapshot {
        RateLimitSnapshot::new(limit, self.count, self.reset_time_ms)
    }
}
