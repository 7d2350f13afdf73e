//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Cron secret and IP allowlist value objects
//! - `application/` - Cron guard, token verification, startup configuration
//! - `presentation/` - axum middleware
//!
//! ## Features
//! - Cron endpoint guard: IP allowlist + shared secret header
//! - Stateless signed bearer tokens identifying end users
//! - Startup validation reporting every configuration problem at once
//!
//! ## Security Model
//! - Secrets compared as SHA-256 digests in constant time
//! - Authentication fails closed; only the failure counter fails open
//! - Failed cron attempts are rate limited per caller IP
//! - Secret values never appear in logs or error messages

pub mod application;
pub mod domain;
pub mod error;
pub mod presentation;

// Re-exports for convenience
pub use application::{
    AuthConfig, ConfigValidator, CronAuthConfig, CronAuthGuard, CronCaller, SignedTokenVerifier,
};
pub use domain::{CronSecret, IpAllowlist};
pub use error::{AuthError, AuthResult, ConfigError, ConfigIssue};
pub use presentation::middleware::{identify_user, require_cron_auth, require_user};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
