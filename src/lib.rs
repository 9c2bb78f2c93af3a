// Email open tracking beacon plus the rate limited /api routes used by
// the dispatcher and the admin dashboard

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tokio::{
    net::TcpListener,
    signal::{self, ctrl_c},
};
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod store;
pub mod tracking_id;

use config::Args;
use error::ServerError;
use handlers::{
    beacon_handler, get_tracking_handler, health_handler, list_tracking_handler, metrics_handler,
    register_handler,
};
use rate_limit::{
    MemoryRateCounter, RateCounter, RateLimiter, RedisRateCounter, enforce_rate_limit, sweeper,
};
use state::AppState;
use store::MemoryTrackingStore;

// Routes; only /api is rate limited
pub fn app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/tracking", post(register_handler).get(list_tracking_handler))
        .route("/tracking/{tracking_id}", get(get_tracking_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), enforce_rate_limit));

    Router::new()
        .route("/track/{tracking_id}", get(beacon_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn build_limiter(args: &Args) -> Result<RateLimiter, ServerError> {
    let counter: Arc<dyn RateCounter> = match &args.redis_url {
        Some(url) => {
            info!("Counting requests in Redis");
            Arc::new(RedisRateCounter::connect(url, args.rate_limit, args.rate_window()).await?)
        }
        None => {
            info!("Counting requests in process");
            Arc::new(MemoryRateCounter::new(args.rate_limit, args.rate_window()))
        }
    };

    Ok(RateLimiter::new(
        counter,
        args.limiter_timeout(),
        args.limiter_fail_policy,
    ))
}

pub async fn start_server(args: Args) -> Result<(), ServerError> {
    args.validate()?;

    let limiter = build_limiter(&args).await?;
    let state = AppState::new(Arc::new(MemoryTrackingStore::new()), limiter.clone());

    tokio::spawn(sweeper(limiter, args.sweep_interval()));

    let address = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&address).await?;

    info!("Beacon server running on http://localhost:{}", args.port);
    info!(
        "Rate limit: {} requests per {} seconds (fail {:?})",
        args.rate_limit, args.rate_window, args.limiter_fail_policy
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
