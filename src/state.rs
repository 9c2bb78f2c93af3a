use std::sync::Arc;

use crate::rate_limit::RateLimiter;
use crate::store::TrackingStore;

// app's shared state

pub struct AppState {
    pub store: Arc<dyn TrackingStore>, // tracking id -> delivery metadata
    pub limiter: RateLimiter,          // consulted before /api handlers
}

impl AppState {
    pub fn new(store: Arc<dyn TrackingStore>, limiter: RateLimiter) -> Arc<Self> {
        Arc::new(Self { store, limiter })
    }
}
