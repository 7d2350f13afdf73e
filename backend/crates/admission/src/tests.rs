//! Scenario tests for the admission crate

#[cfg(test)]
mod support {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use platform::clock::ManualClock;
    use platform::rate_limit::RateLimitPolicy;

    use crate::application::cache::RateLimitCache;
    use crate::application::check_admission::AdmissionController;
    use crate::application::config::AdmissionConfig;
    use crate::domain::entities::RateLimitRecord;
    use crate::domain::repository::RateLimitStore;
    use crate::domain::value_objects::RateLimitKey;
    use crate::error::{StoreError, StoreResult};
    use crate::infra::memory::MemoryRateLimitStore;

    /// Store whose backend errors on every call
    #[derive(Clone, Default)]
    pub struct FailingStore {
        pub calls: Arc<AtomicUsize>,
    }

    impl RateLimitStore for FailingStore {
        async fn get(&self, _policy: &str, _key: &RateLimitKey) -> StoreResult<Option<RateLimitRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn upsert(&self, _record: &RateLimitRecord) -> StoreResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn sweep_expired(&self, _now_ms: i64) -> StoreResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    /// Store that never answers in time
    #[derive(Clone, Default)]
    pub struct HangingStore;

    impl RateLimitStore for HangingStore {
        async fn get(&self, _policy: &str, _key: &RateLimitKey) -> StoreResult<Option<RateLimitRecord>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }

        async fn upsert(&self, _record: &RateLimitRecord) -> StoreResult<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        async fn sweep_expired(&self, _now_ms: i64) -> StoreResult<u64> {
            Ok(0)
        }
    }

    pub fn controller<S>(
        store: S,
        policy: RateLimitPolicy,
        clock: &ManualClock,
    ) -> (AdmissionController<S>, Arc<RateLimitCache>)
    where
        S: RateLimitStore + Send + Sync + 'static,
    {
        let config = AdmissionConfig {
            store_timeout: Duration::from_millis(50),
            ..AdmissionConfig::default()
        };
        let cache = Arc::new(RateLimitCache::new(config.cache_ttl, Arc::new(clock.clone())));
        let controller = AdmissionController::new(
            Arc::new(store),
            cache.clone(),
            Arc::new(clock.clone()),
            policy,
            &config,
        );
        (controller, cache)
    }

    pub fn memory_controller(
        policy: RateLimitPolicy,
        clock: &ManualClock,
    ) -> (AdmissionController<MemoryRateLimitStore>, MemoryRateLimitStore) {
        let store = MemoryRateLimitStore::new();
        let (controller, _) = controller(store.clone(), policy, clock);
        (controller, store)
    }

    pub fn five_per_minute() -> RateLimitPolicy {
        RateLimitPolicy::custom("test", 5, Duration::from_secs(60))
    }

    pub const START_MS: i64 = 1_700_000_000_000;
}

#[cfg(test)]
mod controller_tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use platform::clock::ManualClock;
    use platform::rate_limit::RateLimitPolicy;

    use super::support::*;
    use crate::application::check_admission::AdmissionDecision;
    use crate::domain::repository::RateLimitStore;
    use crate::domain::value_objects::RateLimitKey;

    #[tokio::test]
    async fn test_admits_until_limit_then_denies() {
        let clock = ManualClock::new(START_MS);
        let (controller, _) = memory_controller(five_per_minute(), &clock);
        let key = RateLimitKey::from_raw("ip_198.51.100.7");

        let mut remaining = Vec::new();
        for _ in 0..5 {
            match controller.check(&key).await {
                AdmissionDecision::Allowed(snapshot) => remaining.push(snapshot.remaining),
                other => panic!("expected Allowed, got {other:?}"),
            }
            clock.advance(Duration::from_secs(2));
        }
        assert_eq!(remaining, vec![4, 3, 2, 1, 0]);

        match controller.check(&key).await {
            AdmissionDecision::Denied {
                snapshot,
                retry_after_secs,
            } => {
                assert_eq!(snapshot.remaining, 0);
                assert_eq!(retry_after_secs, 50);
            }
            other => panic!("expected Denied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_denied_requests_are_not_counted() {
        let clock = ManualClock::new(START_MS);
        let (controller, store) = memory_controller(five_per_minute(), &clock);
        let key = RateLimitKey::from_raw("ip_198.51.100.7");

        for _ in 0..8 {
            controller.check(&key).await;
        }

        let stored = store.get("test", &key).await.unwrap().unwrap();
        assert_eq!(stored.count, 5);
    }

    #[tokio::test]
    async fn test_window_reset_admits_and_restarts_count() {
        let clock = ManualClock::new(START_MS);
        let (controller, store) = memory_controller(five_per_minute(), &clock);
        let key = RateLimitKey::from_raw("ip_198.51.100.7");

        for _ in 0..6 {
            controller.check(&key).await;
        }
        assert!(!controller.check(&key).await.is_allowed());

        clock.advance(Duration::from_secs(60));

        match controller.check(&key).await {
            AdmissionDecision::Allowed(snapshot) => {
                assert_eq!(snapshot.remaining, 4);
                assert_eq!(snapshot.reset_at_ms, START_MS + 120_000);
            }
            other => panic!("expected Allowed, got {other:?}"),
        }
        let stored = store.get("test", &key).await.unwrap().unwrap();
        assert_eq!(stored.count, 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let clock = ManualClock::new(START_MS);
        let (controller, _) =
            memory_controller(RateLimitPolicy::custom("one", 1, Duration::from_secs(60)), &clock);

        let a = RateLimitKey::from_raw("ip_10.0.0.1");
        let b = RateLimitKey::from_raw("ip_10.0.0.2");

        assert!(controller.check(&a).await.is_allowed());
        assert!(!controller.check(&a).await.is_allowed());
        assert!(controller.check(&b).await.is_allowed());
    }

    #[tokio::test]
    async fn test_policies_keep_separate_counters() {
        let clock = ManualClock::new(START_MS);
        let (read, _) = memory_controller(RateLimitPolicy::read(), &clock);
        let sensitive = read.with_policy(RateLimitPolicy::sensitive());
        let key = RateLimitKey::from_raw("user_u1_10.0.0.1");

        for _ in 0..3 {
            assert!(sensitive.check(&key).await.is_allowed());
        }
        assert!(!sensitive.check(&key).await.is_allowed());

        match read.check(&key).await {
            AdmissionDecision::Allowed(snapshot) => assert_eq!(snapshot.remaining, 99),
            other => panic!("expected Allowed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_store_state_seen_by_second_replica() {
        let clock = ManualClock::new(START_MS);
        let (replica_a, store) = memory_controller(five_per_minute(), &clock);
        let (replica_b, _) = controller(store.clone(), five_per_minute(), &clock);
        let key = RateLimitKey::from_raw("ip_10.0.0.1");

        for _ in 0..3 {
            replica_a.check(&key).await;
        }

        // replica_b has an empty cache and reads through to the store
        match replica_b.check(&key).await {
            AdmissionDecision::Allowed(snapshot) => assert_eq!(snapshot.remaining, 1),
            other => panic!("expected Allowed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_steady_traffic_rereads_store_after_staleness_bound() {
        let clock = ManualClock::new(START_MS);
        let policy = RateLimitPolicy::custom("steady", 20, Duration::from_secs(600));
        let (replica_a, store) = memory_controller(policy.clone(), &clock);
        let (replica_b, _) = controller(store.clone(), policy, &clock);
        let key = RateLimitKey::from_raw("ip_10.0.0.1");

        replica_b.check(&key).await;
        for _ in 0..5 {
            clock.advance(Duration::from_secs(10));
            replica_b.check(&key).await;
        }

        clock.advance(Duration::from_secs(5));
        for _ in 0..10 {
            replica_a.check(&key).await;
        }

        // 60s after replica_b last read the store
        clock.advance(Duration::from_secs(5));
        match replica_b.check(&key).await {
            AdmissionDecision::Allowed(snapshot) => assert_eq!(snapshot.remaining, 3),
            other => panic!("expected Allowed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failing_store_fails_open() {
        let clock = ManualClock::new(START_MS);
        let store = FailingStore::default();
        let calls = store.calls.clone();
        let (controller, _) = controller(store, five_per_minute(), &clock);
        let key = RateLimitKey::from_raw("ip_10.0.0.1");

        assert_eq!(
            controller.check(&key).await,
            AdmissionDecision::Degraded { limit: 5 }
        );
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_failing_store_still_enforces_through_cache() {
        let clock = ManualClock::new(START_MS);
        let (controller, cache) = controller(FailingStore::default(), five_per_minute(), &clock);
        let key = RateLimitKey::from_raw("ip_10.0.0.1");

        for _ in 0..5 {
            assert_eq!(
                controller.check(&key).await,
                AdmissionDecision::Degraded { limit: 5 }
            );
        }
        assert_eq!(cache.len(), 1);
        assert!(!controller.check(&key).await.is_allowed());
    }

    #[tokio::test]
    async fn test_hanging_store_times_out_and_fails_open() {
        let clock = ManualClock::new(START_MS);
        let (controller, _) = controller(HangingStore, five_per_minute(), &clock);
        let key = RateLimitKey::from_raw("ip_10.0.0.1");

        let decision = tokio::time::timeout(Duration::from_secs(5), controller.check(&key))
            .await
            .expect("store timeout must bound the check");

        assert_eq!(decision, AdmissionDecision::Degraded { limit: 5 });
    }

    #[tokio::test]
    async fn test_peek_does_not_count() {
        let clock = ManualClock::new(START_MS);
        let (controller, _) = memory_controller(five_per_minute(), &clock);
        let key = RateLimitKey::from_raw("ip_10.0.0.1");

        assert!(controller.peek(&key).await.is_none());

        controller.check(&key).await;
        controller.check(&key).await;

        let snapshot = controller.peek(&key).await.unwrap();
        assert_eq!(snapshot.remaining, 3);
        assert_eq!(controller.peek(&key).await.unwrap().remaining, 3);
    }

    #[tokio::test]
    async fn test_peek_after_window_reports_nothing() {
        let clock = ManualClock::new(START_MS);
        let (controller, _) = memory_controller(five_per_minute(), &clock);
        let key = RateLimitKey::from_raw("ip_10.0.0.1");

        controller.check(&key).await;
        clock.advance(Duration::from_secs(61));

        assert!(controller.peek(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_peek_with_failing_store_is_none() {
        let clock = ManualClock::new(START_MS);
        let (controller, _) = controller(FailingStore::default(), five_per_minute(), &clock);

        assert!(controller.peek(&RateLimitKey::from_raw("ip_x")).await.is_none());
    }
}

#[cfg(test)]
mod sweep_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use platform::clock::ManualClock;
    use tokio_util::sync::CancellationToken;

    use super::support::*;
    use crate::application::cache::RateLimitCache;
    use crate::application::sweep::{spawn_sweep_task, sweep_once};
    use crate::domain::value_objects::RateLimitKey;
    use crate::infra::memory::MemoryRateLimitStore;

    #[tokio::test]
    async fn test_sweep_once_removes_expired_and_is_rerunnable() {
        let clock = ManualClock::new(START_MS);
        let (controller, store) = memory_controller(five_per_minute(), &clock);
        let cache = RateLimitCache::new(Duration::from_secs(60), Arc::new(clock.clone()));

        controller.check(&RateLimitKey::from_raw("ip_a")).await;
        controller.check(&RateLimitKey::from_raw("ip_b")).await;
        clock.advance(Duration::from_secs(61));
        controller.check(&RateLimitKey::from_raw("ip_c")).await;

        assert_eq!(sweep_once(&store, &cache, &clock).await.unwrap(), 2);
        assert_eq!(sweep_once(&store, &cache, &clock).await.unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_once_reports_store_failure() {
        let clock = ManualClock::new(START_MS);
        let cache = RateLimitCache::new(Duration::from_secs(60), Arc::new(clock.clone()));

        assert!(sweep_once(&FailingStore::default(), &cache, &clock).await.is_err());
    }

    #[tokio::test]
    async fn test_sweep_task_runs_and_stops_on_cancel() {
        let clock = ManualClock::new(START_MS);
        let (controller, store) = memory_controller(five_per_minute(), &clock);
        controller.check(&RateLimitKey::from_raw("ip_a")).await;
        clock.advance(Duration::from_secs(61));

        let cache = Arc::new(RateLimitCache::new(Duration::from_secs(60), Arc::new(clock.clone())));
        let shutdown = CancellationToken::new();
        let handle = spawn_sweep_task(
            Arc::new(store.clone()),
            cache,
            Arc::new(clock.clone()),
            Duration::from_millis(10),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.is_empty());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweep task must stop after cancellation")
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_task_survives_store_errors() {
        let clock = ManualClock::new(START_MS);
        let store = FailingStore::default();
        let calls = store.calls.clone();
        let cache = Arc::new(RateLimitCache::new(Duration::from_secs(60), Arc::new(clock.clone())));
        let shutdown = CancellationToken::new();

        let handle = spawn_sweep_task(
            Arc::new(store),
            cache,
            Arc::new(clock),
            Duration::from_millis(10),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(calls.load(std::sync::atomic::Ordering::SeqCst) >= 2);
        assert!(!handle.is_finished());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_shared_between_clones() {
        let store = MemoryRateLimitStore::new();
        let clock = ManualClock::new(START_MS);
        let (controller, _) = controller(store.clone(), five_per_minute(), &clock);

        controller.check(&RateLimitKey::from_raw("ip_a")).await;
        assert_eq!(store.len(), 1);
    }
}

#[cfg(test)]
mod middleware_tests {
    use std::net::{IpAddr, SocketAddr};
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::extract::ConnectInfo;
    use axum::{Extension, Router};
    use axum::http::{Request, StatusCode, header};
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use platform::client::TrustedProxies;
    use platform::clock::ManualClock;
    use platform::rate_limit::RateLimitPolicy;
    use tower::ServiceExt;

    use super::support::*;
    use crate::application::check_admission::AdmissionController;
    use crate::domain::repository::RateLimitStore;
    use crate::presentation::middleware::rate_limit;

    fn app<S>(controller: AdmissionController<S>) -> Router
    where
        S: RateLimitStore + Send + Sync + 'static,
    {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(from_fn_with_state(controller, rate_limit::<S>))
    }

    fn request(ip: &str) -> Request<Body> {
        let peer: IpAddr = ip.parse().unwrap();
        Request::builder()
            .uri("/ping")
            .extension(ConnectInfo(SocketAddr::new(peer, 41_000)))
            .body(Body::empty())
            .unwrap()
    }

    fn header_str<'a>(response: &'a axum::response::Response, name: &str) -> &'a str {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_scenario_five_per_minute() {
        let clock = ManualClock::new(START_MS);
        let (controller, _) = memory_controller(five_per_minute(), &clock);
        let app = app(controller);

        for expected in ["4", "3", "2", "1", "0"] {
            let response = app.clone().oneshot(request("198.51.100.7")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(header_str(&response, "x-ratelimit-limit"), "5");
            assert_eq!(header_str(&response, "x-ratelimit-remaining"), expected);
            assert_eq!(
                header_str(&response, "x-ratelimit-reset"),
                ((START_MS + 60_000) / 1000).to_string()
            );
            clock.advance(Duration::from_secs(2));
        }

        let response = app.oneshot(request("198.51.100.7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header_str(&response, "retry-after"), "50");
        assert_eq!(header_str(&response, "x-ratelimit-remaining"), "0");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].is_string());
        assert_eq!(json["retryAfter"], 50);
        assert_eq!(json["limit"], 5);
        assert_eq!(json["remaining"], 0);
        assert_eq!(json["resetTime"], "2023-11-14T22:14:20Z");
    }

    #[tokio::test]
    async fn test_denied_request_never_reaches_handler() {
        let clock = ManualClock::new(START_MS);
        let (controller, _) =
            memory_controller(RateLimitPolicy::custom("one", 1, Duration::from_secs(60)), &clock);

        let hits = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new()
            .route(
                "/ping",
                get(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        "pong"
                    }
                }),
            )
            .layer(from_fn_with_state(
                controller,
                rate_limit::<crate::infra::memory::MemoryRateLimitStore>,
            ));

        app.clone().oneshot(request("10.0.0.1")).await.unwrap();
        let response = app.oneshot(request("10.0.0.1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_callers_limited_separately_by_ip() {
        let clock = ManualClock::new(START_MS);
        let (controller, _) =
            memory_controller(RateLimitPolicy::custom("one", 1, Duration::from_secs(60)), &clock);
        let app = app(controller);

        let first = app.clone().oneshot(request("10.0.0.1")).await.unwrap();
        let second = app.clone().oneshot(request("10.0.0.2")).await.unwrap();
        let repeat = app.oneshot(request("10.0.0.1")).await.unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(repeat.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_forwarded_for_from_untrusted_peer_is_ignored() {
        let clock = ManualClock::new(START_MS);
        let (controller, _) =
            memory_controller(RateLimitPolicy::custom("one", 1, Duration::from_secs(60)), &clock);
        let app = app(controller).layer(Extension(TrustedProxies::parse("10.9.9.9").unwrap()));

        let mut statuses = Vec::new();
        for i in 0..3 {
            let mut req = request("203.0.113.66");
            req.headers_mut()
                .insert("x-forwarded-for", format!("198.51.100.{i}").parse().unwrap());
            statuses.push(app.clone().oneshot(req).await.unwrap().status());
        }

        assert_eq!(
            statuses,
            [
                StatusCode::OK,
                StatusCode::TOO_MANY_REQUESTS,
                StatusCode::TOO_MANY_REQUESTS
            ]
        );
    }

    #[tokio::test]
    async fn test_forwarded_for_from_trusted_proxy_separates_clients() {
        let clock = ManualClock::new(START_MS);
        let (controller, _) =
            memory_controller(RateLimitPolicy::custom("one", 1, Duration::from_secs(60)), &clock);
        let app = app(controller).layer(Extension(TrustedProxies::parse("10.9.9.9").unwrap()));

        for client in ["198.51.100.1", "198.51.100.2"] {
            let mut req = request("10.9.9.9");
            req.headers_mut()
                .insert("x-forwarded-for", client.parse().unwrap());
            let response = app.clone().oneshot(req).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "client {client}");
        }
    }

    #[tokio::test]
    async fn test_scenario_store_down_fails_open() {
        let clock = ManualClock::new(START_MS);
        let (controller, _) = controller(FailingStore::default(), five_per_minute(), &clock);
        let app = app(controller);

        let response = app.oneshot(request("10.0.0.1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "x-ratelimit-remaining"), "unknown");
        assert_eq!(header_str(&response, "x-ratelimit-reset"), "unknown");
        assert_eq!(header_str(&response, "x-ratelimit-limit"), "5");
        assert!(response.headers().get(header::RETRY_AFTER).is_none());

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"pong");
    }
}

#[cfg(test)]
mod response_body_tests {
    use platform::rate_limit::RateLimitSnapshot;

    use crate::domain::entities::RateLimitRecord;
    use crate::error::RateLimitExceededResponse;

    #[test]
    fn test_record_document_layout() {
        let record = RateLimitRecord {
            policy: "read".to_string(),
            key: "ip_10.0.0.1".to_string(),
            count: 3,
            reset_time_ms: 1_000,
            last_request_ms: 500,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["key"], "ip_10.0.0.1");
        assert_eq!(json["count"], 3);
        assert_eq!(json["resetTime"], 1_000);
        assert_eq!(json["lastRequest"], 500);

        let back: RateLimitRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_exceeded_response_serialization() {
        let snapshot = RateLimitSnapshot::new(3, 3, 0);
        let json = serde_json::to_string(&RateLimitExceededResponse::new(&snapshot, 42)).unwrap();

        assert!(json.contains(r#""retryAfter":42"#));
        assert!(json.contains(r#""remaining":0"#));
        assert!(json.contains(r#""resetTime":"1970-01-01T00:00:00Z""#));
    }
}
