//! Rate Limit Read Cache
//!
//! Process-local, bounded-staleness cache in front of the durable store.
//! Not shared across replicas: cross-replica accuracy is bounded by the
//! cache staleness plus store propagation delay.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use platform::clock::Clock;

use crate::domain::entities::RateLimitRecord;
use crate::domain::value_objects::RateLimitKey;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    policy: String,
    key: String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    record: RateLimitRecord,
    refreshed_at_ms: i64,
}

/// Read-through cache of rate limit records
pub struct RateLimitCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimitCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached record if it was refreshed less than `max_age` ago
    pub fn get(&self, policy: &str, key: &RateLimitKey, max_age: Duration) -> Option<RateLimitRecord> {
        let now_ms = self.clock.now_ms();
        let cache_key = CacheKey {
            policy: policy.to_string(),
            key: key.as_str().to_string(),
        };

        let entry = self.entries.get(&cache_key)?;
        if now_ms - entry.refreshed_at_ms < max_age.as_millis() as i64 {
            Some(entry.record.clone())
        } else {
            None
        }
    }

    /// Store a record just read from the durable store
    pub fn put(&self, record: RateLimitRecord) {
        let cache_key = CacheKey {
            policy: record.policy.clone(),
            key: record.key.clone(),
        };
        let entry = CacheEntry {
            record,
            refreshed_at_ms: self.clock.now_ms(),
        };
        self.entries.insert(cache_key, entry);
    }

    /// Store a record this process just counted
    ///
    /// Within the same window the entry keeps the time of its last store
    /// read, so steady local traffic still re-reads the store once the
    /// staleness bound passes.
    pub fn record_write(&self, record: RateLimitRecord) {
        let now_ms = self.clock.now_ms();
        let cache_key = CacheKey {
            policy: record.policy.clone(),
            key: record.key.clone(),
        };

        self.entries
            .entry(cache_key)
            .and_modify(|entry| {
                if entry.record.reset_time_ms != record.reset_time_ms {
                    entry.refreshed_at_ms = now_ms;
                }
                entry.record = record.clone();
            })
            .or_insert_with(|| CacheEntry {
                record: record.clone(),
                refreshed_at_ms: now_ms,
            });
    }

    /// Drop entries older than the TTL or whose window already ended
    ///
    /// Returns the number of entries removed.
    pub fn evict_stale(&self) -> usize {
        let now_ms = self.clock.now_ms();
        let ttl_ms = self.ttl.as_millis() as i64;
        let before = self.entries.len();

        self.entries.retain(|_, entry| {
            now_ms - entry.refreshed_at_ms < ttl_ms && !entry.record.is_expired(now_ms)
        });

        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
