//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Clock sources (wall clock and a manually driven clock for tests)
//! - Client identification (IP, User-Agent, authenticated principal)
//! - Cryptographic utilities (SHA-256, constant-time secret comparison)
//! - Rate limit policies and counter snapshots

pub mod client;
pub mod clock;
pub mod crypto;
pub mod rate_limit;
