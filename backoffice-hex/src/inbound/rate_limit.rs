//! Rate limiting middleware using Governor.
//!
//! Implements per-API-key rate limiting with a token bucket algorithm.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use serde_json::json;
use std::{
    num::NonZeroU32,
    sync::Arc,
    time::{Duration, Instant},
};

/// Requests per minute when nothing is configured.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 100;

/// Most distinct keys tracked at once. Keys seen past this share the
/// overflow bucket until idle buckets are pruned.
pub const MAX_TRACKED_KEYS: usize = 10_000;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct Bucket {
    limiter: Arc<DirectLimiter>,
    last_seen: Instant,
}

/// Rate limiter state shared across requests.
pub struct RateLimiterState {
    /// Per-key buckets
    buckets: DashMap<String, Bucket>,
    /// Shared by every key arriving while the map is full
    overflow: Arc<DirectLimiter>,
    /// Default quota for new keys
    quota: Quota,
    period: Duration,
    max_keys: usize,
}

impl Default for RateLimiterState {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_MINUTE, Duration::from_secs(60))
    }
}

impl RateLimiterState {
    /// Creates a new rate limiter state.
    ///
    /// # Arguments
    /// * `requests` - Number of requests allowed per period (at least 1)
    /// * `period` - Time period for the quota
    pub fn new(requests: u32, period: Duration) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            buckets: DashMap::new(),
            overflow: Arc::new(RateLimiter::direct(quota)),
            quota,
            period,
            max_keys: MAX_TRACKED_KEYS,
        }
    }

    /// Caps how many distinct keys get their own bucket.
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys.max(1);
        self
    }

    /// The period after which an idle bucket is back to a full quota.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of keys currently holding their own bucket.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    /// Checks if a request should be rate limited.
    /// Returns true if the request is allowed, false if rate limited.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        if let Some(mut bucket) = self.buckets.get_mut(key) {
            bucket.last_seen = now;
            let limiter = bucket.limiter.clone();
            drop(bucket);
            return limiter.check().is_ok();
        }

        let limiter = if self.buckets.len() >= self.max_keys {
            self.overflow.clone()
        } else {
            self.buckets
                .entry(key.to_string())
                .or_insert_with(|| Bucket {
                    limiter: Arc::new(RateLimiter::direct(self.quota)),
                    last_seen: now,
                })
                .limiter
                .clone()
        };

        limiter.check().is_ok()
    }

    /// Drops buckets idle for a whole period. Such a bucket has refilled, so
    /// recreating it on the next request changes nothing.
    pub fn retain_recent(&self) -> usize {
        self.retain_recent_at(Instant::now())
    }

    fn retain_recent_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) < self.period);
        before.saturating_sub(self.buckets.len())
    }
}

/// Rate limiting middleware.
///
/// Buckets are keyed by the raw Authorization value, so unauthenticated
/// traffic shares one "anonymous" bucket.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let key = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim_start_matches("Bearer ").to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    if !limiter.check(&key) {
        tracing::warn!("Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded. Please try again later.",
                "code": 429,
                "retry_after_seconds": 60
            })),
        )
            .into_response();
    }

    next.run(request).await
}
