//! Application Configuration
//!
//! Tuning for the admission controller, loaded once at startup.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Admission control configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// Upper bound on how stale a cached counter may be
    pub cache_ttl: Duration,
    /// Timeout applied to every store operation on the request path
    pub store_timeout: Duration,
    /// Period of the expired-record sweep
    pub sweep_interval: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            store_timeout: Duration::from_millis(2000),
            sweep_interval: Duration::from_secs(30 * 60),
        }
    }
}

impl AdmissionConfig {
    /// Load overrides from the environment
    ///
    /// * `RATE_LIMIT_CACHE_TTL_SECS`
    /// * `RATE_LIMIT_STORE_TIMEOUT_MS`
    /// * `RATE_LIMIT_SWEEP_INTERVAL_SECS`
    ///
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            cache_ttl: read_number(&lookup, "RATE_LIMIT_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            store_timeout: read_number(&lookup, "RATE_LIMIT_STORE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            sweep_interval: read_number(&lookup, "RATE_LIMIT_SWEEP_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
        }
    }
}

fn read_number<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "Ignoring malformed setting, using default");
            None
        }
    }
}
