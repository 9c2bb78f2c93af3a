// Per-client sliding window rate limiting.
// Counters pass backend faults through; RateLimiter applies the fail policy.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use redis::{Script, aio::ConnectionManager};
use tokio::time::{Instant, interval, timeout};
use tracing::{debug, info, warn};

use crate::config::FailPolicy;
use crate::error::LimiterError;
use crate::metrics::{API_LATENCY, LIMITER_FALLBACKS, RATE_LIMITED};
use crate::models::RateLimitDecision;
use crate::state::AppState;

pub const FALLBACK_CLIENT: &str = "127.0.0.1";
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Try again later.";

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

#[async_trait]
pub trait RateCounter: Send + Sync {
    // Consume one unit of key's quota if any is left.
    async fn consume(&self, key: &str) -> Result<RateLimitDecision, LimiterError>;

    // Drop state for keys with no requests left in the window.
    async fn sweep(&self) {}

    fn limit(&self) -> u32;

    fn window(&self) -> Duration;
}

// Admitted-request instants per key; denied requests are not recorded
pub struct MemoryRateCounter {
    hits: DashMap<String, VecDeque<Instant>>,
    limit: u32,
    window: Duration,
}

impl MemoryRateCounter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            hits: DashMap::new(),
            limit,
            window,
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.hits.len()
    }
}

fn prune(log: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = log.front() {
        if now.duration_since(oldest) >= window {
            log.pop_front();
        } else {
            break;
        }
    }
}

#[async_trait]
impl RateCounter for MemoryRateCounter {
    async fn consume(&self, key: &str) -> Result<RateLimitDecision, LimiterError> {
        let now = Instant::now();
        let mut log = self.hits.entry(key.to_string()).or_default();
        prune(&mut log, now, self.window);

        let used = u32::try_from(log.len()).unwrap_or(u32::MAX);
        let allowed = used < self.limit;
        if allowed {
            log.push_back(now);
        }

        let remaining = self.limit.saturating_sub(used + u32::from(allowed));
        let reset_in = log
            .front()
            .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
            .unwrap_or(self.window);

        Ok(RateLimitDecision {
            allowed,
            limit: self.limit,
            remaining,
            reset_at: now_millis() + millis(reset_in),
        })
    }

    async fn sweep(&self) {
        let now = Instant::now();
        let window = self.window;
        let before = self.hits.len();
        self.hits.retain(|_, log| {
            prune(log, now, window);
            !log.is_empty()
        });
        debug!(
            removed = before.saturating_sub(self.hits.len()),
            "swept idle rate buckets"
        );
    }

    fn limit(&self) -> u32 {
        self.limit
    }

    fn window(&self) -> Duration {
        self.window
    }
}

// Same sliding log as MemoryRateCounter, as one atomic script on a sorted set.
// Returns {allowed, remaining, reset_at_ms}.
const SLIDING_WINDOW_SCRIPT: &str = r"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local used = redis.call('ZCARD', key)
local allowed = 0
if used < limit then
  redis.call('ZADD', key, now, ARGV[4])
  used = used + 1
  allowed = 1
end
redis.call('PEXPIRE', key, window)

local reset_at = now + window
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if oldest[2] then
  reset_at = tonumber(oldest[2]) + window
end
return {allowed, limit - used, reset_at}
";

static MEMBER_SEQ: AtomicU64 = AtomicU64::new(0);

pub struct RedisRateCounter {
    conn: ConnectionManager,
    script: Script,
    prefix: String,
    limit: u32,
    window: Duration,
}

impl RedisRateCounter {
    pub async fn connect(
        redis_url: &str,
        limit: u32,
        window: Duration,
    ) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            script: Script::new(SLIDING_WINDOW_SCRIPT),
            prefix: "mail-beacon:ratelimit".to_string(),
            limit,
            window,
        })
    }
}

#[async_trait]
impl RateCounter for RedisRateCounter {
    async fn consume(&self, key: &str) -> Result<RateLimitDecision, LimiterError> {
        let now = now_millis();
        let member = format!("{now}-{}", MEMBER_SEQ.fetch_add(1, Ordering::Relaxed));

        let mut invocation = self.script.prepare_invoke();
        invocation
            .key(format!("{}:{key}", self.prefix))
            .arg(now)
            .arg(millis(self.window))
            .arg(self.limit)
            .arg(member);

        let mut conn = self.conn.clone();
        let reply: Vec<i64> = invocation.invoke_async(&mut conn).await?;

        match reply.as_slice() {
            [allowed, remaining, reset_at] => Ok(RateLimitDecision {
                allowed: *allowed == 1,
                limit: self.limit,
                remaining: u32::try_from((*remaining).max(0)).unwrap_or(0),
                reset_at: *reset_at,
            }),
            other => Err(LimiterError::Protocol(format!(
                "expected 3 integers, got {}",
                other.len()
            ))),
        }
    }

    fn limit(&self) -> u32 {
        self.limit
    }

    fn window(&self) -> Duration {
        self.window
    }
}

// Call-site limiter: timeout + fail policy around a counter
#[derive(Clone)]
pub struct RateLimiter {
    counter: Arc<dyn RateCounter>,
    timeout: Duration,
    fail_policy: FailPolicy,
}

impl RateLimiter {
    pub fn new(counter: Arc<dyn RateCounter>, timeout: Duration, fail_policy: FailPolicy) -> Self {
        Self {
            counter,
            timeout,
            fail_policy,
        }
    }

    pub async fn check(&self, key: &str) -> RateLimitDecision {
        let outcome = match timeout(self.timeout, self.counter.consume(key)).await {
            Ok(result) => result,
            Err(_) => Err(LimiterError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(decision) => decision,
            Err(e) => {
                LIMITER_FALLBACKS.inc();
                warn!(client = key, policy = ?self.fail_policy, "rate counter failed: {e}");
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> RateLimitDecision {
        let limit = self.counter.limit();
        let reset_at = now_millis() + millis(self.counter.window());
        match self.fail_policy {
            FailPolicy::Open => RateLimitDecision {
                allowed: true,
                limit,
                remaining: limit,
                reset_at,
            },
            FailPolicy::Closed => RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at,
            },
        }
    }

    pub async fn sweep(&self) {
        self.counter.sweep().await;
    }
}

// First X-Forwarded-For hop, or loopback when the client can't be traced.
// Every untraceable client shares the loopback bucket.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(FALLBACK_CLIENT)
        .to_string()
}

// Middleware for the API routes: decide, run or reject, then attach quota headers
pub async fn enforce_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(request.headers());
    let decision = state.limiter.check(&key).await;

    let mut response = if decision.allowed {
        let start_time = std::time::Instant::now();
        let response = next.run(request).await;
        API_LATENCY.observe(start_time.elapsed().as_secs_f64());
        response
    } else {
        RATE_LIMITED.inc();
        debug!(client = %key, "rate limited");
        (StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE).into_response()
    };

    decision.apply_headers(response.headers_mut());
    response
}

// Background sweep of idle buckets - runs every `every`
pub async fn sweeper(limiter: RateLimiter, every: Duration) {
    let mut interval = interval(every);

    info!("Rate bucket sweeper started (interval: {:?})", every);

    loop {
        interval.tick().await;
        limiter.sweep().await;
    }
}
