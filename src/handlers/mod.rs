mod beacon;
mod health;
mod metrics;
mod tracking;

pub use beacon::{PIXEL_GIF, beacon_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use tracking::{get_tracking_handler, list_tracking_handler, register_handler};
