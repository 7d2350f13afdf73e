//! Rate Limit Middleware

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use platform::client::{AuthenticatedUser, client_ip};
use platform::rate_limit::apply_unknown_headers;

use crate::application::check_admission::{AdmissionController, AdmissionDecision};
use crate::domain::repository::RateLimitStore;
use crate::domain::value_objects::RateLimitKey;
use crate::error::AdmissionError;

/// Middleware enforcing the controller's policy
///
/// Wire with `axum::middleware::from_fn_with_state(controller, rate_limit::<S>)`.
/// Identity middleware that inserts [`AuthenticatedUser`] must run first.
pub async fn rate_limit<S>(
    State(controller): State<AdmissionController<S>>,
    req: Request,
    next: Next,
) -> Response
where
    S: RateLimitStore + Send + Sync + 'static,
{
    let key = resolve_key(&req);

    match controller.check(&key).await {
        AdmissionDecision::Allowed(snapshot) => {
            let mut response = next.run(req).await;
            snapshot.apply_headers(response.headers_mut());
            response
        }
        AdmissionDecision::Denied {
            snapshot,
            retry_after_secs,
        } => AdmissionError::RateLimitExceeded {
            snapshot,
            retry_after_secs,
        }
        .into_response(),
        AdmissionDecision::Degraded { limit } => {
            let mut response = next.run(req).await;
            apply_unknown_headers(response.headers_mut(), limit);
            response
        }
    }
}

/// Identity key for a request
pub fn resolve_key(req: &Request) -> RateLimitKey {
    RateLimitKey::resolve(client_ip(req), req.extensions().get::<AuthenticatedUser>())
}
