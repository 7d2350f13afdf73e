//! Presentation Layer
//!
//! axum middleware.

pub mod middleware;

pub use middleware::{identify_user, require_cron_auth, require_user};
