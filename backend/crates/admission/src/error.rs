//! Admission Error Types
//!
//! `StoreError` never reaches the caller: the controller absorbs it and
//! fails open. `AdmissionError` is the only error rendered as a response.

use std::time::Duration;

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use kernel::error::kind::ErrorKind;
use platform::rate_limit::RateLimitSnapshot;
use serde::Serialize;
use thiserror::Error;

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable store failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend did not answer within the configured timeout
    #[error("Rate limit store timed out after {0:?}")]
    Timeout(Duration),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Backend unreachable or refused the operation
    #[error("Rate limit store unavailable: {0}")]
    Unavailable(String),
}

/// Admission outcomes surfaced to the caller
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Caller exhausted the quota for the current window
    #[error("Rate limit exceeded")]
    RateLimitExceeded {
        snapshot: RateLimitSnapshot,
        retry_after_secs: u64,
    },
}

/// Body of a 429 response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitExceededResponse {
    pub error: &'static str,
    pub retry_after: u64,
    pub limit: u32,
    pub remaining: u32,
    /// RFC 3339 instant at which the window resets
    pub reset_time: String,
}

impl RateLimitExceededResponse {
    pub fn new(snapshot: &RateLimitSnapshot, retry_after_secs: u64) -> Self {
        let reset_time = DateTime::<Utc>::from_timestamp_millis(snapshot.reset_at_ms)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();

        Self {
            error: "Too many requests, please try again later.",
            retry_after: retry_after_secs,
            limit: snapshot.limit,
            remaining: snapshot.remaining,
            reset_time,
        }
    }
}

impl AdmissionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdmissionError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AdmissionError::RateLimitExceeded { .. } => ErrorKind::TooManyRequests,
        }
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            AdmissionError::RateLimitExceeded {
                snapshot,
                retry_after_secs,
            } => {
                let body = RateLimitExceededResponse::new(&snapshot, retry_after_secs);
                let mut response = (status, Json(body)).into_response();

                let headers = response.headers_mut();
                snapshot.apply_headers(headers);
                headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));

                response
            }
        }
    }
}
