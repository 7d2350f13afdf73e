//! Application Configuration
//!
//! Startup configuration for cron authentication and bearer identity.
//! Validated once before the listener binds; every problem is reported
//! together and none of them is recoverable.

use std::sync::Arc;

use platform::client::TrustedProxies;

use crate::application::verify_token::SignedTokenVerifier;
use crate::domain::value_object::cron_secret::CronSecret;
use crate::domain::value_object::ip_allowlist::IpAllowlist;
use crate::error::{ConfigError, ConfigIssue};

pub const CRON_SECRET_ENV: &str = "CRON_SECRET";
pub const ALLOWED_CRON_IPS_ENV: &str = "ALLOWED_CRON_IPS";
pub const AUTH_TOKEN_SECRET_ENV: &str = "AUTH_TOKEN_SECRET";
pub const TRUSTED_PROXIES_ENV: &str = "TRUSTED_PROXIES";

/// Cron caller credentials
#[derive(Debug, Clone)]
pub struct CronAuthConfig {
    pub secret: Arc<CronSecret>,
    pub allowlist: Arc<IpAllowlist>,
}

/// Auth configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub cron: CronAuthConfig,
    /// Peers whose `X-Forwarded-For` is believed; empty means none
    pub trusted_proxies: TrustedProxies,
    /// `None` when `AUTH_TOKEN_SECRET` is unset; every caller is anonymous
    pub token_verifier: Option<Arc<SignedTokenVerifier>>,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut validator = ConfigValidator::default();

        let secret = validator.check(CronSecret::new(lookup(CRON_SECRET_ENV).unwrap_or_default()));
        let allowlist =
            validator.check_all(IpAllowlist::parse(&lookup(ALLOWED_CRON_IPS_ENV).unwrap_or_default()));
        let trusted_proxies = validator.check_all(
            TrustedProxies::parse(&lookup(TRUSTED_PROXIES_ENV).unwrap_or_default()).map_err(
                |invalid| invalid.into_iter().map(ConfigIssue::InvalidTrustedProxy).collect(),
            ),
        );
        let token_verifier = match lookup(AUTH_TOKEN_SECRET_ENV) {
            Some(raw) if !raw.is_empty() => validator.check(SignedTokenVerifier::new(&raw)).map(Some),
            _ => Some(None),
        };

        match (secret, allowlist, trusted_proxies, token_verifier) {
            (Some(secret), Some(allowlist), Some(trusted_proxies), Some(token_verifier)) => Ok(Self {
                cron: CronAuthConfig {
                    secret: Arc::new(secret),
                    allowlist: Arc::new(allowlist),
                },
                trusted_proxies,
                token_verifier: token_verifier.map(Arc::new),
            }),
            _ => Err(validator.into_error()),
        }
    }
}

/// Collects configuration issues instead of stopping at the first one
#[derive(Debug, Default)]
pub struct ConfigValidator {
    issues: Vec<ConfigIssue>,
}

impl ConfigValidator {
    pub fn check<T>(&mut self, result: Result<T, ConfigIssue>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(issue) => {
                self.issues.push(issue);
                None
            }
        }
    }

    pub fn check_all<T>(&mut self, result: Result<T, Vec<ConfigIssue>>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(issues) => {
                self.issues.extend(issues);
                None
            }
        }
    }

    pub fn issues(&self) -> &[ConfigIssue] {
        &self.issues
    }

    pub fn into_error(self) -> ConfigError {
        ConfigError::new(self.issues)
    }
}
