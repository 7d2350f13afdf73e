//! Application Layer
//!
//! Use cases and application services.

pub mod authenticate_cron;
pub mod config;
pub mod verify_token;

// Re-exports
pub use authenticate_cron::{CronAuthGuard, CronCaller};
pub use config::{AuthConfig, ConfigValidator, CronAuthConfig};
pub use verify_token::SignedTokenVerifier;
