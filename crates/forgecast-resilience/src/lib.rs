#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Resilience primitives: the retry wrapper (A), token-bucket rate limiter
//! (B), and circuit breaker (C), plus the [`ServiceRegistry`] that owns them.

pub mod circuit_breaker;
pub mod rate_limiter;
pub mod registry;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use rate_limiter::{BucketSpec, RateLimiter};
pub use registry::ServiceRegistry;
pub use retry::{classify_http_status, retry_with_backoff};
