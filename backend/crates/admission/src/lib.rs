//! Admission Control Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Rate limit records, identity keys, store trait
//! - `application/` - Admission controller, read cache, background sweep
//! - `infra/` - In-memory and PostgreSQL store implementations
//! - `presentation/` - axum middleware
//!
//! ## Enforcement Model
//! - Fixed window counters, one record per `(policy, key)`
//! - Storage faults fail open: the request is admitted and the rate limit
//!   headers report `unknown` instead of a guessed number
//! - Read-then-increment is not serialized per key; concurrent requests for
//!   the same key may be under-counted by the number of racing requests

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::cache::RateLimitCache;
pub use application::check_admission::{AdmissionController, AdmissionDecision};
pub use application::config::AdmissionConfig;
pub use application::sweep::{spawn_sweep_task, sweep_once};
pub use domain::entities::RateLimitRecord;
pub use domain::repository::RateLimitStore;
pub use domain::value_objects::RateLimitKey;
pub use error::{AdmissionError, RateLimitExceededResponse, StoreError, StoreResult};
pub use infra::memory::MemoryRateLimitStore;
pub use infra::postgres::PgRateLimitStore;
pub use presentation::middleware::rate_limit;
pub use platform::rate_limit::{RateLimitPolicy, RateLimitSnapshot};

#[cfg(test)]
mod tests;
