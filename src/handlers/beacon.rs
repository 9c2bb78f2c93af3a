use axum::{
    body::Bytes,
    extract::{Path, State, rejection::PathRejection},
    http::{
        HeaderName, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA},
    },
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::StoreError;
use crate::logging::OPENS_TARGET;
use crate::metrics::{BEACON_ERRORS, BEACON_HITS, FIRST_OPENS};
use crate::state::AppState;
use crate::store::TrackingStore;

// 1x1 transparent GIF
pub static PIXEL_GIF: [u8; 42] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
];

const NO_CACHE: [(HeaderName, &str); 3] = [
    (CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (PRAGMA, "no-cache"),
    (EXPIRES, "0"),
];

// Record the first open, if any, and log it
async fn record_open(store: &dyn TrackingStore, tracking_id: &str) -> Result<(), StoreError> {
    let opened_at = chrono::Utc::now().timestamp_millis();

    if let Some(record) = store.mark_opened(tracking_id, opened_at).await? {
        FIRST_OPENS.inc();
        info!(
            target: OPENS_TARGET,
            tracking_id,
            recipient = %record.recipient,
            subject = %record.subject,
            sent_at = record.sent_at,
            opened_at,
            "email opened"
        );
    }
    Ok(())
}

fn pixel_response() -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "image/gif")],
        NO_CACHE,
        Bytes::from_static(&PIXEL_GIF),
    )
        .into_response()
}

// The body never says whether the id was known; failures are logged only.
// An id that doesn't decode is just another unknown id.
pub async fn beacon_handler(
    State(state): State<Arc<AppState>>,
    tracking_id: Result<Path<String>, PathRejection>,
) -> Response {
    BEACON_HITS.inc();

    let Path(tracking_id) = match tracking_id {
        Ok(path) => path,
        Err(rejection) => {
            debug!("undecodable tracking id: {rejection}");
            return pixel_response();
        }
    };

    match record_open(state.store.as_ref(), &tracking_id).await {
        Ok(()) => pixel_response(),
        Err(e) => {
            BEACON_ERRORS.inc();
            error!(tracking_id = %tracking_id, "beacon failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, NO_CACHE).into_response()
        }
    }
}
