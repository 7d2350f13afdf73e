//! Authenticate Cron Use Case
//!
//! Guards internally-triggered endpoints. Checks run in order and stop at
//! the first failure:
//!
//! 1. caller IP against the allowlist (skipped when the allowlist is empty)
//! 2. presence of `x-cron-secret`
//! 3. constant-time comparison with the configured secret
//!
//! Failed attempts are counted per caller under the `cron_failures`
//! policy. Once a caller exhausts it, further requests are refused with 429
//! before any secret comparison. The failure counter fails open like every
//! other admission policy, but authentication itself always fails closed.

use std::net::IpAddr;
use std::sync::Arc;

use admission::{AdmissionController, AdmissionDecision, RateLimitKey, RateLimitPolicy, RateLimitStore};

use crate::application::config::CronAuthConfig;
use crate::domain::value_object::cron_secret::CronSecret;
use crate::domain::value_object::ip_allowlist::IpAllowlist;
use crate::error::{AuthError, AuthResult};

/// Request metadata the guard needs
#[derive(Debug, Clone, Copy)]
pub struct CronCaller<'a> {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<&'a str>,
    pub endpoint: &'a str,
    /// Raw `x-cron-secret` header value
    pub secret: Option<&'a str>,
}

/// Cron authentication guard
pub struct CronAuthGuard<S>
where
    S: RateLimitStore + Send + Sync + 'static,
{
    secret: Arc<CronSecret>,
    allowlist: Arc<IpAllowlist>,
    failures: AdmissionController<S>,
}

impl<S> Clone for CronAuthGuard<S>
where
    S: RateLimitStore + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            secret: self.secret.clone(),
            allowlist: self.allowlist.clone(),
            failures: self.failures.clone(),
        }
    }
}

impl<S> CronAuthGuard<S>
where
    S: RateLimitStore + Send + Sync + 'static,
{
    /// `admission` may carry any policy; the guard derives `cron_failures`
    /// over the same store and cache.
    pub fn new(config: &CronAuthConfig, admission: &AdmissionController<S>) -> Self {
        Self {
            secret: config.secret.clone(),
            allowlist: config.allowlist.clone(),
            failures: admission.with_policy(RateLimitPolicy::cron_failures()),
        }
    }

    pub async fn authenticate(&self, caller: &CronCaller<'_>) -> AuthResult<()> {
        let key = RateLimitKey::resolve(caller.ip, None);

        if let Some(snapshot) = self.failures.peek(&key).await {
            if snapshot.remaining == 0 {
                let retry_after_secs = snapshot.retry_after_secs(self.failures.now_ms());
                tracing::warn!(
                    ip = ?caller.ip,
                    user_agent = caller.user_agent.unwrap_or("-"),
                    endpoint = caller.endpoint,
                    retry_after_secs = retry_after_secs,
                    "Cron caller blocked after repeated failures"
                );
                return Err(AuthError::TooManyFailures {
                    snapshot,
                    retry_after_secs,
                });
            }
        }

        match self.verify(caller) {
            Ok(()) => {
                tracing::info!(
                    ip = ?caller.ip,
                    endpoint = caller.endpoint,
                    "Cron request authenticated"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    reason = e.reason(),
                    ip = ?caller.ip,
                    user_agent = caller.user_agent.unwrap_or("-"),
                    endpoint = caller.endpoint,
                    "Cron authentication rejected"
                );
                self.record_failure(&key).await;
                Err(e)
            }
        }
    }

    fn verify(&self, caller: &CronCaller<'_>) -> AuthResult<()> {
        if !self.allowlist.allows(caller.ip) {
            return Err(AuthError::IpNotAllowed);
        }

        let provided = caller.secret.ok_or(AuthError::MissingSecret)?;

        if !self.secret.matches(provided) {
            return Err(AuthError::InvalidSecret);
        }

        Ok(())
    }

    async fn record_failure(&self, key: &RateLimitKey) {
        if let AdmissionDecision::Degraded { .. } = self.failures.check(key).await {
            tracing::debug!(key = %key, "Cron failure not recorded, store unavailable");
        }
    }
}
