//! PostgreSQL Store Implementation
//!
//! One row per `(policy, key)` in `rate_limits`; see
//! `database/migrations` for the schema.

use sqlx::PgPool;

use crate::domain::entities::RateLimitRecord;
use crate::domain::repository::RateLimitStore;
use crate::domain::value_objects::RateLimitKey;
use crate::error::StoreResult;

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgRateLimitStore {
    pool: PgPool,
}

impl PgRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RateLimitStore for PgRateLimitStore {
    async fn get(&self, policy: &str, key: &RateLimitKey) -> StoreResult<Option<RateLimitRecord>> {
        let row = sqlx::query_as::<_, RateLimitRow>(
            r#"
            SELECT policy, key, count, reset_time_ms, last_request_ms
            FROM rate_limits
            WHERE policy = $1 AND key = $2
            "#,
        )
        .bind(policy)
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RateLimitRow::into_record))
    }

    async fn upsert(&self, record: &RateLimitRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rate_limits (policy, key, count, reset_time_ms, last_request_ms)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (policy, key)
            DO UPDATE SET
                count = EXCLUDED.count,
                reset_time_ms = EXCLUDED.reset_time_ms,
                last_request_ms = EXCLUDED.last_request_ms
            "#,
        )
        .bind(&record.policy)
        .bind(&record.key)
        .bind(record.count as i32)
        .bind(record.reset_time_ms)
        .bind(record.last_request_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn sweep_expired(&self, now_ms: i64) -> StoreResult<u64> {
        let deleted = sqlx::query("DELETE FROM rate_limits WHERE reset_time_ms < $1")
            .bind(now_ms)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct RateLimitRow {
    policy: String,
    key: String,
    count: i32,
    reset_time_ms: i64,
    last_request_ms: i64,
}

impl RateLimitRow {
    fn into_record(self) -> RateLimitRecord {
        RateLimitRecord {
            policy: self.policy,
            key: self.key,
            count: self.count.max(0) as u32,
            reset_time_ms: self.reset_time_ms,
            last_request_ms: self.last_request_ms,
        }
    }
}
