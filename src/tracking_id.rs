use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

// Create a tracking id (hash of recipient + subject + send time + sequence)
// Sending the same message twice still yields two ids
pub fn make_tracking_id(recipient: &str, subject: &str, sent_at: i64) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(recipient);
    hasher.update([0u8]);
    hasher.update(subject);
    hasher.update(sent_at.to_be_bytes());
    hasher.update(nanos.to_be_bytes());
    hasher.update(seq.to_be_bytes());

    let digest = format!("{:x}", hasher.finalize());
    digest[..32].to_string()
}
