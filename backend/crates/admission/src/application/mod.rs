//! Application Layer
//!
//! Orchestrates the read cache and the durable store into admission
//! decisions, and owns the background sweep.

pub mod cache;
pub mod check_admission;
pub mod config;
pub mod sweep;
