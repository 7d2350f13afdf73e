//! Repository Traits
//!
//! Interfaces for counter persistence. Implementations are in the infra layer.

use crate::domain::entities::RateLimitRecord;
use crate::domain::value_objects::RateLimitKey;
use crate::error::StoreResult;

/// Durable rate limit counter storage, one record per `(policy, key)`
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Fetch the stored record, expired or not
    async fn get(&self, policy: &str, key: &RateLimitKey) -> StoreResult<Option<RateLimitRecord>>;

    /// Insert or overwrite the record identified by its policy and key
    async fn upsert(&self, record: &RateLimitRecord) -> StoreResult<()>;

    /// Delete every record whose `reset_time_ms < now_ms`
    ///
    /// Returns the number of records removed.
    async fn sweep_expired(&self, now_ms: i64) -> StoreResult<u64>;
}
