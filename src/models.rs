use axum::http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

// Delivery metadata for one dispatched notification
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    pub tracking_id: String,
    pub recipient: String,
    pub subject: String,
    pub sent_at: i64, // epoch millis, never changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<i64>, // first open only
}

impl TrackingRecord {
    pub fn new(
        tracking_id: impl Into<String>,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        sent_at: i64,
    ) -> Self {
        Self {
            tracking_id: tracking_id.into(),
            recipient: recipient.into(),
            subject: subject.into(),
            sent_at,
            opened_at: None,
        }
    }

    pub fn is_opened(&self) -> bool {
        self.opened_at.is_some()
    }
}

// Outcome of one rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: i64, // epoch millis
}

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

impl RateLimitDecision {
    // Quota headers go on every response, allowed or not
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(HEADER_LIMIT, HeaderValue::from(self.limit));
        headers.insert(HEADER_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(HEADER_RESET, HeaderValue::from(self.reset_at));
    }
}

// Body sent by the notification dispatcher
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub recipient: String,
    #[serde(default)]
    pub subject: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub tracking_id: String,
    pub pixel_path: String,
    pub sent_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackingSummary {
    pub total: usize,
    pub opened: usize,
    pub records: Vec<TrackingRecord>,
}

impl TrackingSummary {
    // newest first
    pub fn from_records(mut records: Vec<TrackingRecord>) -> Self {
        records.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        let opened = records.iter().filter(|r| r.is_opened()).count();
        Self {
            total: records.len(),
            opened,
            records,
        }
    }
}
