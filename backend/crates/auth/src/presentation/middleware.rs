//! Auth Middleware
//!
//! - `require_cron_auth` guards cron-triggered routes
//! - `identify_user` attaches [`AuthenticatedUser`] from a bearer token
//! - `require_user` rejects requests without one

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use platform::client::{AuthenticatedUser, client_ip, user_agent};

use admission::RateLimitStore;

use crate::application::authenticate_cron::{CronAuthGuard, CronCaller};
use crate::application::verify_token::SignedTokenVerifier;
use crate::error::AuthError;

/// Header carrying the cron secret (exact, case-sensitive value)
pub const X_CRON_SECRET: HeaderName = HeaderName::from_static("x-cron-secret");

/// Middleware that requires cron credentials
///
/// Wire with `axum::middleware::from_fn_with_state(guard, require_cron_auth::<S>)`.
pub async fn require_cron_auth<S>(
    State(guard): State<CronAuthGuard<S>>,
    req: Request,
    next: Next,
) -> Response
where
    S: RateLimitStore + Send + Sync + 'static,
{
    let headers = req.headers();
    let caller = CronCaller {
        ip: client_ip(&req),
        user_agent: user_agent(headers),
        endpoint: req.uri().path(),
        // A non UTF-8 value is present but can never match
        secret: headers
            .get(X_CRON_SECRET)
            .map(|value| value.to_str().unwrap_or_default()),
    };

    match guard.authenticate(&caller).await {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

/// Middleware that identifies the caller from `Authorization: Bearer`
///
/// Never rejects: an absent or invalid token leaves the request anonymous.
pub async fn identify_user(
    State(verifier): State<Arc<SignedTokenVerifier>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(req.headers()) {
        match verifier.verify(token) {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) => {
                tracing::debug!(reason = e.reason(), "Ignoring bearer token");
            }
        }
    }

    next.run(req).await
}

/// Middleware that requires an identified user
///
/// Must be layered inside `identify_user`.
pub async fn require_user(req: Request, next: Next) -> Response {
    if req.extensions().get::<AuthenticatedUser>().is_none() {
        return AuthError::Unauthenticated.into_response();
    }
    next.run(req).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
