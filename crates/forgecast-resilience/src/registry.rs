//! `ServiceRegistry`: the one place rate limiters and circuit breakers live.
//!
//! Per the "no hidden process-wide state" design note, callers receive this
//! registry explicitly (constructed once at the root and threaded through)
//! rather than reaching for global statics.

use std::sync::Arc;

use dashmap::DashMap;

use forgecast_telemetry::Metrics;

use crate::circuit_breaker::CircuitBreaker;
use crate::rate_limiter::RateLimiter;

/// Explicit, passed-around home for every rate limiter and circuit breaker
/// the pipeline uses, keyed by name/action string.
pub struct ServiceRegistry {
    rate_limiter: RateLimiter,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    metrics: Metrics,
}

impl ServiceRegistry {
    /// Construct a registry backed by `metrics` for observability.
    #[must_use]
    pub fn new(metrics: Metrics) -> Self {
        Self {
            rate_limiter: RateLimiter::new().with_metrics(metrics.clone()),
            breakers: DashMap::new(),
            metrics,
        }
    }

    /// Shared token-bucket rate limiter.
    #[must_use]
    pub const fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Fetch (creating with spec defaults on first use) the circuit breaker
    /// guarding `dependency`.
    #[must_use]
    pub fn breaker(&self, dependency: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(dependency.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::with_defaults(dependency).with_metrics(self.metrics.clone()))
            })
            .clone()
    }

    /// The shared metrics handle.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_is_memoized_per_dependency() {
        let registry = ServiceRegistry::new(Metrics::new().unwrap());
        let a = registry.breaker("flaresolverr");
        let b = registry.breaker("flaresolverr");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
