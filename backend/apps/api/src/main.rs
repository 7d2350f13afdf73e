//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.
//!
//! Startup aborts with a non-zero exit code when the cron configuration is
//! invalid; nothing binds before it validates.

mod app;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use admission::{
    AdmissionConfig, AdmissionController, MemoryRateLimitStore, PgRateLimitStore, RateLimitCache,
    RateLimitPolicy, RateLimitStore, spawn_sweep_task,
};
use auth::AuthConfig;
use axum::http::HeaderValue;
use platform::clock::{Clock, SystemClock};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{AppServices, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,admission=info,auth=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration before anything binds
    let auth_config = match AuthConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            for issue in &e.issues {
                tracing::error!(issue = %issue, "Invalid configuration");
            }
            return Err(e.into());
        }
    };
    let admission_config = AdmissionConfig::from_env();

    tracing::info!(
        cron_allowlist_entries = auth_config.cron.allowlist.len(),
        trusted_proxies = auth_config.trusted_proxies.len(),
        bearer_tokens = auth_config.token_verifier.is_some(),
        cache_ttl_secs = admission_config.cache_ttl.as_secs(),
        store_timeout_ms = admission_config.store_timeout.as_millis() as u64,
        "Configuration loaded"
    );

    // Rate limit store selection
    match env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;

            tracing::info!("Connected to database");

            // Run migrations
            sqlx::migrate!("../../../database/migrations")
                .run(&pool)
                .await?;

            tracing::info!("Migrations completed");

            serve(
                PgRateLimitStore::new(pool),
                "postgres",
                auth_config,
                admission_config,
            )
            .await
        }
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, using in-process rate limit store (single replica only)"
            );
            serve(
                MemoryRateLimitStore::new(),
                "memory",
                auth_config,
                admission_config,
            )
            .await
        }
    }
}

/// Run the server over the chosen store until Ctrl+C
async fn serve<S>(
    store: S,
    store_kind: &'static str,
    auth_config: AuthConfig,
    admission_config: AdmissionConfig,
) -> anyhow::Result<()>
where
    S: RateLimitStore + Send + Sync + 'static,
{
    let store = Arc::new(store);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(RateLimitCache::new(admission_config.cache_ttl, clock.clone()));

    let admission = AdmissionController::new(
        store.clone(),
        cache.clone(),
        clock.clone(),
        RateLimitPolicy::read(),
        &admission_config,
    );

    // Background sweep of expired counters
    let shutdown = CancellationToken::new();
    let sweep_handle = spawn_sweep_task(
        store,
        cache,
        clock,
        admission_config.sweep_interval,
        shutdown.clone(),
    );

    // CORS configuration
    let frontend_origins =
        env::var("FRONTEND_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let frontend_origins: Vec<HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let app = build_router(AppServices {
        admission,
        auth: auth_config,
        store_kind,
        frontend_origins,
    });

    // Start server
    let port = match env::var("PORT") {
        Ok(raw) => raw.trim().parse::<u16>().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, "Ignoring malformed PORT, using 5000");
            5000
        }),
        Err(_) => 5000,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await?;

    // Stop the sweep and wait for an in-flight run to finish
    shutdown.cancel();
    if let Err(e) = sweep_handle.await {
        tracing::error!(error = %e, "Rate limit sweep task failed");
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = shutdown.cancelled() => {}
    }
}
