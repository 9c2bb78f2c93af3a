use crate::error::AppError;
use crate::metrics::{TRACKED_RECORDS, render};
use crate::state::AppState;
use axum::extract::State;
use std::sync::Arc;

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<String, AppError> {
    // refresh the gauge from the store so it survives overwrites
    let tracked = state.store.count().await?;
    TRACKED_RECORDS.set(tracked as f64);
    render()
}
