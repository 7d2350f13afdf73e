//! Value Object Module

pub mod cron_secret;
pub mod ip_allowlist;
