use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::error::ServerError;

// What the limiter answers when the counting service is down or too slow
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailPolicy {
    // admit everything
    #[default]
    Open,
    // reject everything
    Closed,
}

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "mail-beacon")]
#[command(about = "Email open tracking beacon with per-client rate limiting")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "MAIL_BEACON_PORT", default_value_t = 8080)]
    pub port: u16,

    // Rate limit max requests per window
    #[arg(long, env = "MAIL_BEACON_RATE_LIMIT", default_value_t = 10)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "MAIL_BEACON_RATE_WINDOW", default_value_t = 10)]
    pub rate_window: u64,

    // Max time one counting-service call may take
    #[arg(long, env = "MAIL_BEACON_LIMITER_TIMEOUT_MS", default_value_t = 250)]
    pub limiter_timeout_ms: u64,

    #[arg(long, env = "MAIL_BEACON_LIMITER_FAIL_POLICY", value_enum, default_value_t = FailPolicy::Open)]
    pub limiter_fail_policy: FailPolicy,

    // Redis counting service, e.g. "redis://127.0.0.1:6379"
    // Without it requests are counted in process
    #[arg(long, env = "MAIL_BEACON_REDIS_URL")]
    pub redis_url: Option<String>,

    // Seconds between sweeps of idle rate buckets
    #[arg(long, env = "MAIL_BEACON_SWEEP_INTERVAL", default_value_t = 60)]
    pub sweep_interval: u64,

    // Log filter used when RUST_LOG is unset
    #[arg(long, env = "MAIL_BEACON_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.rate_limit == 0 {
            return Err(ServerError::invalid("rate-limit", "must be at least 1"));
        }
        if self.rate_window == 0 {
            return Err(ServerError::invalid("rate-window", "must be at least 1 second"));
        }
        if self.limiter_timeout_ms == 0 {
            return Err(ServerError::invalid("limiter-timeout-ms", "must be at least 1"));
        }
        if self.sweep_interval == 0 {
            return Err(ServerError::invalid("sweep-interval", "must be at least 1 second"));
        }
        Ok(())
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    pub fn limiter_timeout(&self) -> Duration {
        Duration::from_millis(self.limiter_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }
}
