//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters/gauges the queue worker and resilience layer need.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    events_emitted_total: IntCounterVec,
    stage_runs_total: IntCounterVec,
    queue_depth: IntGauge,
    retries_total: IntCounterVec,
    rate_limit_waits_total: IntCounterVec,
    circuit_trips_total: IntCounterVec,
    jobs_requeued_total: IntCounter,
    jobs_failed_total: IntCounter,
    jobs_cancelled_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Current queue depth (jobs in QUEUED or RUNNING state).
    pub queue_depth: i64,
    /// Total jobs requeued after a retryable failure.
    pub jobs_requeued_total: u64,
    /// Total jobs that failed terminally.
    pub jobs_failed_total: u64,
    /// Total jobs cancelled before completion.
    pub jobs_cancelled_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events_emitted_total = IntCounterVec::new(
            Opts::new("events_emitted_total", "Domain events emitted by type"),
            &["type"],
        )
        .map_err(|source| registration_error("events_emitted_total", source))?;
        let stage_runs_total = IntCounterVec::new(
            Opts::new(
                "stage_runs_total",
                "Pipeline stage executions by stage and outcome",
            ),
            &["stage", "outcome"],
        )
        .map_err(|source| registration_error("stage_runs_total", source))?;
        let queue_depth = IntGauge::with_opts(Opts::new(
            "queue_depth",
            "Jobs currently queued or running",
        ))
        .map_err(|source| registration_error("queue_depth", source))?;
        let retries_total = IntCounterVec::new(
            Opts::new("retries_total", "Retry attempts by service/action key"),
            &["key"],
        )
        .map_err(|source| registration_error("retries_total", source))?;
        let rate_limit_waits_total = IntCounterVec::new(
            Opts::new(
                "rate_limit_waits_total",
                "Token bucket waits by service/action key",
            ),
            &["key"],
        )
        .map_err(|source| registration_error("rate_limit_waits_total", source))?;
        let circuit_trips_total = IntCounterVec::new(
            Opts::new(
                "circuit_trips_total",
                "Circuit breaker transitions to OPEN by dependency name",
            ),
            &["dependency"],
        )
        .map_err(|source| registration_error("circuit_trips_total", source))?;
        let jobs_requeued_total = IntCounter::with_opts(Opts::new(
            "jobs_requeued_total",
            "Jobs requeued after a retryable failure",
        ))
        .map_err(|source| registration_error("jobs_requeued_total", source))?;
        let jobs_failed_total = IntCounter::with_opts(Opts::new(
            "jobs_failed_total",
            "Jobs that failed terminally",
        ))
        .map_err(|source| registration_error("jobs_failed_total", source))?;
        let jobs_cancelled_total = IntCounter::with_opts(Opts::new(
            "jobs_cancelled_total",
            "Jobs cancelled before completion",
        ))
        .map_err(|source| registration_error("jobs_cancelled_total", source))?;

        for collector in [
            Box::new(events_emitted_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(stage_runs_total.clone()),
            Box::new(queue_depth.clone()),
            Box::new(retries_total.clone()),
            Box::new(rate_limit_waits_total.clone()),
            Box::new(circuit_trips_total.clone()),
            Box::new(jobs_requeued_total.clone()),
            Box::new(jobs_failed_total.clone()),
            Box::new(jobs_cancelled_total.clone()),
        ] {
            registry
                .register(collector)
                .map_err(|source| registration_error("collector", source))?;
        }

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                events_emitted_total,
                stage_runs_total,
                queue_depth,
                retries_total,
                rate_limit_waits_total,
                circuit_trips_total,
                jobs_requeued_total,
                jobs_failed_total,
                jobs_cancelled_total,
            }),
        })
    }

    /// Record that an event of the given kind was published.
    pub fn record_event(&self, kind: &str) {
        self.inner.events_emitted_total.with_label_values(&[kind]).inc();
    }

    /// Record a stage execution outcome (e.g. `"scan"`, `"ok"`).
    pub fn record_stage_run(&self, stage: &str, outcome: &str) {
        self.inner
            .stage_runs_total
            .with_label_values(&[stage, outcome])
            .inc();
    }

    /// Set the current queue depth gauge.
    pub fn set_queue_depth(&self, depth: i64) {
        self.inner.queue_depth.set(depth);
    }

    /// Record a retry attempt for the given rate-limit/retry key.
    pub fn record_retry(&self, key: &str) {
        self.inner.retries_total.with_label_values(&[key]).inc();
    }

    /// Record a token-bucket wait for the given key.
    pub fn record_rate_limit_wait(&self, key: &str) {
        self.inner
            .rate_limit_waits_total
            .with_label_values(&[key])
            .inc();
    }

    /// Record a circuit breaker transition into OPEN for a dependency.
    pub fn record_circuit_trip(&self, dependency: &str) {
        self.inner
            .circuit_trips_total
            .with_label_values(&[dependency])
            .inc();
    }

    /// Record a job requeue.
    pub fn record_job_requeued(&self) {
        self.inner.jobs_requeued_total.inc();
    }

    /// Record a terminal job failure.
    pub fn record_job_failed(&self) {
        self.inner.jobs_failed_total.inc();
    }

    /// Record a job cancellation.
    pub fn record_job_cancelled(&self) {
        self.inner.jobs_cancelled_total.inc();
    }

    /// Render the registry in Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric families cannot be encoded.
    pub fn encode(&self) -> anyhow::Result<String> {
        let families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Snapshot the gauges/counters most relevant to health checks.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_depth: self.inner.queue_depth.get(),
            jobs_requeued_total: self.inner.jobs_requeued_total.get(),
            jobs_failed_total: self.inner.jobs_failed_total.get(),
            jobs_cancelled_total: self.inner.jobs_cancelled_total.get(),
        }
    }
}

fn registration_error(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricRegistration { name, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_metrics() {
        let metrics = Metrics::new().expect("metrics registry");
        metrics.set_queue_depth(3);
        metrics.record_job_requeued();
        metrics.record_job_failed();
        metrics.record_job_cancelled();
        metrics.record_event("file_entry_progressed");
        metrics.record_stage_run("scan", "ok");
        metrics.record_retry("tmdb");
        metrics.record_rate_limit_wait("tracker/demo/upload");
        metrics.record_circuit_trip("flaresolverr");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.queue_depth, 3);
        assert_eq!(snapshot.jobs_requeued_total, 1);
        assert_eq!(snapshot.jobs_failed_total, 1);
        assert_eq!(snapshot.jobs_cancelled_total, 1);

        let encoded = metrics.encode().expect("encode metrics");
        assert!(encoded.contains("queue_depth"));
        assert!(encoded.contains("circuit_trips_total"));
    }
}
