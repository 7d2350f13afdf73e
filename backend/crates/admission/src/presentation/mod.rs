//! Presentation Layer
//!
//! axum middleware.

pub mod middleware;
