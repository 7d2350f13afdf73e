//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use admission::{AdmissionError, RateLimitSnapshot};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Caller address is not in the cron allowlist
    #[error("Caller IP not in allowlist")]
    IpNotAllowed,

    /// `x-cron-secret` header absent
    #[error("Missing cron secret")]
    MissingSecret,

    /// `x-cron-secret` header does not match
    #[error("Invalid cron secret")]
    InvalidSecret,

    /// Too many failed cron authentication attempts from this caller
    #[error("Too many failed authentication attempts")]
    TooManyFailures {
        snapshot: RateLimitSnapshot,
        retry_after_secs: u64,
    },

    /// Bearer token malformed or signature mismatch
    #[error("Invalid bearer token")]
    InvalidToken,

    /// Route requires an authenticated user
    #[error("Authentication required")]
    Unauthenticated,
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::TooManyFailures { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::TooManyFailures { .. } => ErrorKind::TooManyRequests,
            _ => ErrorKind::Unauthorized,
        }
    }

    /// Short machine-readable reason for logs
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::IpNotAllowed => "ip_not_allowed",
            AuthError::MissingSecret => "missing_secret",
            AuthError::InvalidSecret => "invalid_secret",
            AuthError::TooManyFailures { .. } => "too_many_failures",
            AuthError::InvalidToken => "invalid_token",
            AuthError::Unauthenticated => "unauthenticated",
        }
    }

    /// Convert to AppError
    ///
    /// Cron rejections share one message so the response does not reveal
    /// which check failed.
    pub fn to_app_error(&self) -> AppError {
        match self {
            AuthError::IpNotAllowed | AuthError::MissingSecret | AuthError::InvalidSecret => {
                AppError::unauthorized("Unauthorized")
            }
            _ => AppError::new(self.kind(), self.to_string()),
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::TooManyFailures { .. } => {
                tracing::warn!(reason = self.reason(), "Auth request throttled");
            }
            _ => {
                tracing::debug!(reason = self.reason(), "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        match self {
            AuthError::TooManyFailures {
                snapshot,
                retry_after_secs,
            } => AdmissionError::RateLimitExceeded {
                snapshot,
                retry_after_secs,
            }
            .into_response(),
            other => other.to_app_error().into_response(),
        }
    }
}

/// A single startup configuration problem
///
/// Messages name the variable, never its value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("CRON_SECRET is not set")]
    MissingCronSecret,

    #[error("CRON_SECRET must be at least {min} characters (got {actual})")]
    CronSecretTooShort { min: usize, actual: usize },

    #[error("ALLOWED_CRON_IPS contains an invalid address: {0:?}")]
    InvalidAllowlistEntry(String),

    #[error("TRUSTED_PROXIES contains an invalid address: {0:?}")]
    InvalidTrustedProxy(String),

    #[error("AUTH_TOKEN_SECRET must be at least {min} characters (got {actual})")]
    TokenSecretTooShort { min: usize, actual: usize },
}

/// Every configuration problem found at startup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid configuration: {}", join_issues(.issues))]
pub struct ConfigError {
    pub issues: Vec<ConfigIssue>,
}

impl ConfigError {
    pub fn new(issues: Vec<ConfigIssue>) -> Self {
        Self { issues }
    }
}

fn join_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
