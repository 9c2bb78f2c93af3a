use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::info;

use crate::error::AppError;
use crate::metrics::RECORDS_REGISTERED;
use crate::models::{RegisterRequest, RegisterResponse, TrackingRecord, TrackingSummary};
use crate::state::AppState;
use crate::tracking_id::make_tracking_id;

// Called by the notification sender before the message goes out
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let recipient = payload.recipient.trim();
    if recipient.is_empty() {
        return Err(AppError::BadRequest("recipient is required".to_string()));
    }

    let sent_at = chrono::Utc::now().timestamp_millis();
    let tracking_id = make_tracking_id(recipient, &payload.subject, sent_at);

    state
        .store
        .put(TrackingRecord::new(
            tracking_id.clone(),
            recipient,
            payload.subject,
            sent_at,
        ))
        .await?;
    RECORDS_REGISTERED.inc();
    info!(tracking_id = %tracking_id, "tracking record registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            pixel_path: format!("/track/{tracking_id}"),
            tracking_id,
            sent_at,
        }),
    ))
}

pub async fn list_tracking_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TrackingSummary>, AppError> {
    let records = state.store.list().await?;
    Ok(Json(TrackingSummary::from_records(records)))
}

pub async fn get_tracking_handler(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
) -> Result<Json<TrackingRecord>, AppError> {
    state
        .store
        .get(&tracking_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}
