//! Token-bucket rate limiter (component B), keyed by `(service, action)`.
//!
//! Grounded on the domain-state-per-key pattern: a bucket is only ever
//! mutated while holding its own short-lived lock, never the map's.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::trace;

use forgecast_telemetry::Metrics;

/// Capacity and refill parameters for a single bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketSpec {
    /// Maximum tokens the bucket can hold.
    pub capacity: f64,
    /// Tokens added per second.
    pub refill_rate: f64,
}

impl BucketSpec {
    /// Construct a spec with equal capacity and burst size.
    #[must_use]
    pub const fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
        }
    }
}

/// Default bucket for TMDB requests: 4 tokens/s, burst 4.
pub const TMDB_DEFAULT: BucketSpec = BucketSpec::new(4.0, 4.0);
/// Default bucket for tracker upload actions: 1 token/s, burst 1.
pub const TRACKER_UPLOAD_DEFAULT: BucketSpec = BucketSpec::new(1.0, 1.0);
/// Default bucket for tracker search actions: 2 tokens/s, burst 2.
pub const TRACKER_SEARCH_DEFAULT: BucketSpec = BucketSpec::new(2.0, 2.0);
/// Default bucket for image-host upload actions: 1 token/s, burst 1.
pub const IMAGE_UPLOAD_DEFAULT: BucketSpec = BucketSpec::new(1.0, 1.0);

struct BucketState {
    spec: BucketSpec,
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn new(spec: BucketSpec) -> Self {
        Self {
            spec,
            tokens: spec.capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.spec.refill_rate).min(self.spec.capacity);
        self.last_refill = now;
    }
}

/// Process-wide collection of token buckets, keyed by a caller-chosen string
/// such as `"tmdb"` or `"tracker/demo/upload"`.
pub struct RateLimiter {
    buckets: DashMap<String, std::sync::Arc<Mutex<BucketState>>>,
    metrics: Option<Metrics>,
}

impl RateLimiter {
    /// Construct an empty limiter with no preconfigured buckets.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
            metrics: None,
        }
    }

    /// Attach a metrics sink used to record rate-limit waits.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Explicitly (re)configure a bucket, overriding any schema default. The
    /// current token count is preserved but clamped to the new capacity.
    pub fn configure(&self, key: &str, spec: BucketSpec) {
        let entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| std::sync::Arc::new(Mutex::new(BucketState::new(spec))));
        let mut state = entry.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.spec = spec;
        state.tokens = state.tokens.min(spec.capacity);
    }

    /// Acquire `n` tokens from the bucket at `key`, creating it with `default`
    /// parameters on first use. Suspends until enough tokens have refilled.
    pub async fn acquire(&self, key: &str, n: f64, default: BucketSpec) {
        loop {
            let bucket = self
                .buckets
                .entry(key.to_string())
                .or_insert_with(|| std::sync::Arc::new(Mutex::new(BucketState::new(default))))
                .clone();

            let wait = {
                let mut state = bucket.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                state.refill(Instant::now());
                if state.tokens >= n {
                    state.tokens -= n;
                    None
                } else {
                    let deficit = n - state.tokens;
                    Some(Duration::from_secs_f64(deficit / state.spec.refill_rate))
                }
            };

            match wait {
                None => return,
                Some(delay) => {
                    trace!(key, ?delay, "rate limit wait");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_rate_limit_wait(key);
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test(start_paused = true)]
    async fn burst_capacity_is_not_exceeded() {
        let limiter = RateLimiter::new();
        let spec = BucketSpec::new(4.0, 4.0);

        for _ in 0..4 {
            limiter.acquire("tmdb", 1.0, spec).await;
        }

        let start = tokio::time::Instant::now();
        limiter.acquire("tmdb", 1.0, spec).await;
        let elapsed = start.elapsed();
        assert!(
            elapsed >= StdDuration::from_millis(200),
            "fifth acquire on an empty bucket should wait for refill, waited {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ten_requests_against_capacity_four_take_at_least_1_5s() {
        let limiter = RateLimiter::new();
        let spec = BucketSpec::new(4.0, 4.0);
        let start = tokio::time::Instant::now();
        for _ in 0..10 {
            limiter.acquire("tmdb", 1.0, spec).await;
        }
        assert!(start.elapsed() >= StdDuration::from_millis(1_500));
    }

    #[tokio::test]
    async fn configure_clamps_existing_tokens_to_new_capacity() {
        let limiter = RateLimiter::new();
        limiter.configure("tracker/demo/upload", BucketSpec::new(5.0, 1.0));
        limiter.configure("tracker/demo/upload", BucketSpec::new(1.0, 1.0));
        let start = tokio::time::Instant::now();
        limiter
            .acquire("tracker/demo/upload", 1.0, TRACKER_UPLOAD_DEFAULT)
            .await;
        assert!(start.elapsed() < StdDuration::from_millis(50));
    }
}
