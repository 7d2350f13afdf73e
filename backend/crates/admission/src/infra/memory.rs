//! In-Process Store
//!
//! Single-replica store for development and tests. Counters do not survive
//! a restart and are not shared between processes.

use std::sync::Arc;

use dashmap::DashMap;

use crate::domain::entities::RateLimitRecord;
use crate::domain::repository::RateLimitStore;
use crate::domain::value_objects::RateLimitKey;
use crate::error::StoreResult;

/// DashMap-backed store keyed by `(policy, key)`
#[derive(Clone, Default)]
pub struct MemoryRateLimitStore {
    records: Arc<DashMap<(String, String), RateLimitRecord>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    async fn get(&self, policy: &str, key: &RateLimitKey) -> StoreResult<Option<RateLimitRecord>> {
        let id = (policy.to_string(), key.as_str().to_string());
        Ok(self.records.get(&id).map(|entry| entry.value().clone()))
    }

    async fn upsert(&self, record: &RateLimitRecord) -> StoreResult<()> {
        let id = (record.policy.clone(), record.key.clone());
        self.records.insert(id, record.clone());
        Ok(())
    }

    async fn sweep_expired(&self, now_ms: i64) -> StoreResult<u64> {
        let before = self.records.len();
        self.records
            .retain(|_, record| record.reset_time_ms >= now_ms);
        Ok(before.saturating_sub(self.records.len()) as u64)
    }
}
