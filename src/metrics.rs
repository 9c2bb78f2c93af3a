use lazy_static::lazy_static;
use prometheus::{
    Counter, Encoder, Gauge, Histogram, TextEncoder, register_counter, register_gauge,
    register_histogram,
};

use crate::error::AppError;

lazy_static! {
    pub static ref BEACON_HITS: Counter =
        register_counter!("mail_beacon_hits_total", "Total beacon requests").unwrap();
    pub static ref FIRST_OPENS: Counter =
        register_counter!("mail_beacon_first_opens_total", "Tracked messages opened for the first time").unwrap();
    pub static ref BEACON_ERRORS: Counter =
        register_counter!("mail_beacon_errors_total", "Beacon requests that failed internally").unwrap();
    pub static ref RECORDS_REGISTERED: Counter =
        register_counter!("mail_beacon_records_registered_total", "Tracking records created").unwrap();
    pub static ref TRACKED_RECORDS: Gauge =
        register_gauge!("mail_beacon_tracked_records", "Current number of tracking records").unwrap();
    pub static ref RATE_LIMITED: Counter =
        register_counter!("mail_beacon_rate_limited_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref LIMITER_FALLBACKS: Counter =
        register_counter!("mail_beacon_limiter_fallbacks_total", "Rate checks decided by fail policy").unwrap();
    pub static ref API_LATENCY: Histogram = register_histogram!(
        "mail_beacon_api_latency_seconds",
        "API request latency in seconds"
    )
    .unwrap();
}

// Render every registered metric in text exposition format
pub fn render() -> Result<String, AppError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(format!("metrics encode: {e}")))?;
    String::from_utf8(buffer).map_err(|e| AppError::Internal(format!("metrics utf8: {e}")))
}
