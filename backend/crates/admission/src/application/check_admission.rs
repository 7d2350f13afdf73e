//! Check Admission Use Case
//!
//! Fixed window counter over the read cache and the durable store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use platform::clock::Clock;
use platform::rate_limit::{RateLimitPolicy, RateLimitSnapshot};

use crate::application::cache::RateLimitCache;
use crate::application::config::AdmissionConfig;
use crate::domain::entities::RateLimitRecord;
use crate::domain::repository::RateLimitStore;
use crate::domain::value_objects::RateLimitKey;
use crate::error::{StoreError, StoreResult};

/// Outcome of a single admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Request counted and admitted
    Allowed(RateLimitSnapshot),
    /// Quota for the current window is exhausted
    Denied {
        snapshot: RateLimitSnapshot,
        retry_after_secs: u64,
    },
    /// A store operation failed; the request is admitted without a reliable count
    Degraded { limit: u32 },
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, AdmissionDecision::Denied { .. })
    }
}

/// Admission controller for one policy
///
/// Cheap to clone; clones share the store, cache and clock. Use
/// [`AdmissionController::with_policy`] to derive the other presets over
/// the same backing state.
pub struct AdmissionController<S>
where
    S: RateLimitStore + Send + Sync + 'static,
{
    store: Arc<S>,
    cache: Arc<RateLimitCache>,
    clock: Arc<dyn Clock>,
    policy: Arc<RateLimitPolicy>,
    store_timeout: Duration,
}

impl<S> Clone for AdmissionController<S>
where
    S: RateLimitStore + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: self.cache.clone(),
            clock: self.clock.clone(),
            policy: self.policy.clone(),
            store_timeout: self.store_timeout,
        }
    }
}

impl<S> AdmissionController<S>
where
    S: RateLimitStore + Send + Sync + 'static,
{
    pub fn new(
        store: Arc<S>,
        cache: Arc<RateLimitCache>,
        clock: Arc<dyn Clock>,
        policy: RateLimitPolicy,
        config: &AdmissionConfig,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            policy: Arc::new(policy),
            store_timeout: config.store_timeout,
        }
    }

    /// Same store, cache and clock under a different policy
    pub fn with_policy(&self, policy: RateLimitPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
            ..self.clone()
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Current time on the controller's clock
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Count a request for `key` and decide whether it may proceed
    pub async fn check(&self, key: &RateLimitKey) -> AdmissionDecision {
        let now_ms = self.clock.now_ms();
        let limit = self.policy.max_requests;

        let (mut record, mut degraded) = self.load(key, now_ms).await;

        if record.count >= limit {
            let snapshot = record.snapshot(limit);
            let retry_after_secs = snapshot.retry_after_secs(now_ms);
            tracing::warn!(
                key = %key,
                policy = %self.policy.name,
                count = record.count,
                limit = limit,
                retry_after_secs = retry_after_secs,
                "Rate limit exceeded"
            );
            return AdmissionDecision::Denied {
                snapshot,
                retry_after_secs,
            };
        }

        record.record_request(now_ms);

        // The cache holds the attempted state even when the store write fails
        if degraded {
            self.cache.put(record.clone());
        } else {
            self.cache.record_write(record.clone());
        }

        if let Err(e) = self.with_timeout(self.store.upsert(&record)).await {
            tracing::error!(
                error = %e,
                key = %key,
                policy = %self.policy.name,
                "Rate limit store write failed, admitting request"
            );
            degraded = true;
        }

        if degraded {
            AdmissionDecision::Degraded { limit }
        } else {
            AdmissionDecision::Allowed(record.snapshot(limit))
        }
    }

    /// Current counter state for `key` without counting a request
    ///
    /// `None` when the caller has no live window or the store failed.
    pub async fn peek(&self, key: &RateLimitKey) -> Option<RateLimitSnapshot> {
        let now_ms = self.clock.now_ms();
        let (record, degraded) = self.load(key, now_ms).await;

        if degraded || record.count == 0 {
            return None;
        }
        Some(record.snapshot(self.policy.max_requests))
    }

    /// Live record for `key`, or a fresh one
    ///
    /// The flag is `true` when the store failed and the fresh record is a
    /// fail-open substitute.
    async fn load(&self, key: &RateLimitKey, now_ms: i64) -> (RateLimitRecord, bool) {
        let max_age = self.policy.cache_staleness(self.cache.ttl());
        let fresh = || RateLimitRecord::fresh(&self.policy.name, key, now_ms, self.policy.window_ms());

        let cached = self.cache.get(&self.policy.name, key, max_age);
        let stored = match cached {
            Some(record) => Ok(Some(record)),
            None => {
                let result = self.with_timeout(self.store.get(&self.policy.name, key)).await;
                if let Ok(Some(record)) = &result {
                    self.cache.put(record.clone());
                }
                result
            }
        };

        match stored {
            Ok(Some(record)) if !record.is_expired(now_ms) => (record, false),
            Ok(_) => (fresh(), false),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    key = %key,
                    policy = %self.policy.name,
                    "Rate limit store read failed, treating as new window"
                );
                (fresh(), true)
            }
        }
    }

    async fn with_timeout<T>(&self, operation: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        tokio::time::timeout(self.store_timeout, operation)
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout))?
    }
}
