//! Domain Layer
//!
//! Value objects for cron caller authentication.

pub mod value_object;

// Re-exports
pub use value_object::{cron_secret::CronSecret, ip_allowlist::IpAllowlist};
