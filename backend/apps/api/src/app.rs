//! HTTP Application
//!
//! Route table and the middleware stack shared by every route.

use std::any::Any;

use admission::presentation::middleware::resolve_key;
use admission::{AdmissionController, RateLimitPolicy, RateLimitStore, rate_limit};
use auth::{AuthConfig, CronAuthGuard, identify_user, require_cron_auth, require_user};
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use kernel::error::app_error::AppError;
use platform::client::AuthenticatedUser;
use platform::rate_limit::{X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer, ExposeHeaders};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Everything the router needs, built once at startup
pub struct AppServices<S>
where
    S: RateLimitStore + Send + Sync + 'static,
{
    /// Base controller; each route group derives its policy from it
    pub admission: AdmissionController<S>,
    pub auth: AuthConfig,
    /// `"postgres"` or `"memory"`, reported by `/health`
    pub store_kind: &'static str,
    pub frontend_origins: Vec<HeaderValue>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub store: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub uid: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatusResponse {
    pub policy: String,
    pub limit: u32,
    /// `None` when the count is unavailable
    pub remaining: Option<u32>,
    pub reset_time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CronAcceptedResponse {
    pub message: &'static str,
}

/// Build the full application router
pub fn build_router<S>(services: AppServices<S>) -> Router
where
    S: RateLimitStore + Send + Sync + 'static,
{
    let AppServices {
        admission,
        auth,
        store_kind,
        frontend_origins,
    } = services;

    let read = admission.with_policy(RateLimitPolicy::read());
    let authenticated = admission.with_policy(RateLimitPolicy::authenticated());
    let cron_guard = CronAuthGuard::new(&auth.cron, &admission);

    // Inner route_layer calls run last
    let me = Router::new()
        .route("/api/me", get(me))
        .route_layer(from_fn(require_user))
        .route_layer(from_fn_with_state(authenticated, rate_limit::<S>));

    let status = Router::new()
        .route("/api/rate-limit", get(rate_limit_status::<S>))
        .route_layer(from_fn_with_state(read.clone(), rate_limit::<S>))
        .with_state(read);

    let mut user_api = Router::new().merge(me).merge(status);
    if let Some(verifier) = auth.token_verifier.clone() {
        user_api = user_api.layer(from_fn_with_state(verifier, identify_user));
    } else {
        tracing::warn!("AUTH_TOKEN_SECRET not set, all API callers are anonymous");
    }

    let cron = Router::new()
        .route(
            "/api/cron/budget-alerts",
            get(budget_alerts).post(budget_alerts),
        )
        .route_layer(from_fn_with_state(cron_guard, require_cron_auth::<S>));

    // Outside every route layer so client IP resolution sees it
    let app = Router::new()
        .route("/health", get(move || health(store_kind)))
        .merge(user_api)
        .merge(cron)
        .fallback(not_found)
        .layer(Extension(auth.trusted_proxies.clone()));

    apply_middleware(app, frontend_origins)
}

/// Layers applied to every response, including 404s and panics
pub fn apply_middleware(router: Router, frontend_origins: Vec<HeaderValue>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(frontend_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .expose_headers(ExposeHeaders::list([
            X_RATELIMIT_LIMIT,
            X_RATELIMIT_REMAINING,
            X_RATELIMIT_RESET,
            header::RETRY_AFTER,
        ]))
        .allow_credentials(true);

    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(security_header(
            header::X_CONTENT_TYPE_OPTIONS,
            "nosniff",
        ))
        .layer(security_header(header::X_FRAME_OPTIONS, "DENY"))
        .layer(security_header(header::X_XSS_PROTECTION, "1; mode=block"))
        .layer(security_header(
            header::STRICT_TRANSPORT_SECURITY,
            "max-age=31536000; includeSubDomains",
        ))
        .layer(security_header(
            header::CONTENT_SECURITY_POLICY,
            "default-src 'self'",
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn security_header(
    name: HeaderName,
    value: &'static str,
) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = detail, "Unhandled panic in request handler");

    AppError::internal("Internal server error").into_response()
}

async fn health(store: &'static str) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        store,
    })
}

async fn me(Extension(user): Extension<AuthenticatedUser>) -> Json<MeResponse> {
    Json(MeResponse { uid: user.uid })
}

/// Caller's standing under the read policy
async fn rate_limit_status<S>(
    State(controller): State<AdmissionController<S>>,
    req: Request,
) -> Json<RateLimitStatusResponse>
where
    S: RateLimitStore + Send + Sync + 'static,
{
    let key = resolve_key(&req);
    let policy = controller.policy();
    let snapshot = controller.peek(&key).await;

    Json(RateLimitStatusResponse {
        policy: policy.name.to_string(),
        limit: policy.max_requests,
        remaining: snapshot.map(|s| s.remaining),
        reset_time: snapshot
            .and_then(|s| DateTime::<Utc>::from_timestamp_millis(s.reset_at_ms))
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
    })
}

/// Trigger the budget alert scan
///
/// The scan itself runs in the finance service; this endpoint only
/// authenticates the scheduler and acknowledges the trigger.
async fn budget_alerts(req: Request) -> Json<CronAcceptedResponse> {
    tracing::info!(method = %req.method(), "Budget alert scan triggered");
    Json(CronAcceptedResponse {
        message: "Budget alert scan triggered",
    })
}

async fn not_found() -> AppError {
    AppError::not_found("Not found")
}

