//! Domain Layer
//!
//! - Entities (RateLimitRecord)
//! - Value objects (RateLimitKey)
//! - Repository traits (RateLimitStore)

pub mod entities;
pub mod repository;
pub mod value_objects;
