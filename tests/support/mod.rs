#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{Request, Response},
};
use tower::ServiceExt;

use mail_beacon::{
    app,
    config::FailPolicy,
    error::{LimiterError, StoreError},
    models::{RateLimitDecision, TrackingRecord},
    rate_limit::{MemoryRateCounter, RateCounter, RateLimiter},
    state::AppState,
    store::{MemoryTrackingStore, TrackingStore},
};

pub const WINDOW: Duration = Duration::from_secs(10);

pub struct Harness {
    pub store: Arc<MemoryTrackingStore>,
    pub router: Router,
}

pub fn harness(limit: u32) -> Harness {
    let store = Arc::new(MemoryTrackingStore::new());
    let limiter = RateLimiter::new(
        Arc::new(MemoryRateCounter::new(limit, WINDOW)),
        Duration::from_millis(250),
        FailPolicy::Open,
    );
    let router = app(AppState::new(store.clone(), limiter));
    Harness { store, router }
}

pub fn router_with(
    store: Arc<dyn TrackingStore>,
    counter: Arc<dyn RateCounter>,
    policy: FailPolicy,
) -> Router {
    let limiter = RateLimiter::new(counter, Duration::from_millis(250), policy);
    app(AppState::new(store, limiter))
}

pub async fn send(router: &Router, request: Request<Body>) -> (Response<Body>, Bytes) {
    let response = router.clone().oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    (Response::from_parts(parts, Body::empty()), bytes)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_from(uri: &str, client: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, json: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

pub fn sample_record(id: &str) -> TrackingRecord {
    TrackingRecord::new(
        id,
        "shelter-lead@example.org",
        "Evacuation route B closed",
        1_700_000_000_000,
    )
}

// Store whose backend is always down
pub struct UnavailableStore;

#[async_trait]
impl TrackingStore for UnavailableStore {
    async fn put(&self, _record: TrackingRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("primary down".into()))
    }

    async fn get(&self, _tracking_id: &str) -> Result<Option<TrackingRecord>, StoreError> {
        Err(StoreError::Unavailable("primary down".into()))
    }

    async fn mark_opened(
        &self,
        _tracking_id: &str,
        _opened_at: i64,
    ) -> Result<Option<TrackingRecord>, StoreError> {
        Err(StoreError::Unavailable("primary down".into()))
    }

    async fn list(&self) -> Result<Vec<TrackingRecord>, StoreError> {
        Err(StoreError::Unavailable("primary down".into()))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("primary down".into()))
    }
}

// Counting service that cannot be reached
pub struct UnreachableCounter;

#[async_trait]
impl RateCounter for UnreachableCounter {
    async fn consume(&self, _key: &str) -> Result<RateLimitDecision, LimiterError> {
        Err(LimiterError::Protocol("connection refused".into()))
    }

    fn limit(&self) -> u32 {
        10
    }

    fn window(&self) -> Duration {
        WINDOW
    }
}
