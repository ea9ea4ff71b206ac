//! Errors raised while initializing telemetry.

use thiserror::Error;

/// Result type for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors produced while installing logging or metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The global tracing subscriber could not be installed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying error returned by `tracing_subscriber`.
        #[source]
        source: anyhow::Error,
    },
    /// A Prometheus collector could not be registered.
    #[error("failed to register prometheus collector: {name}")]
    MetricRegistration {
        /// Name of the collector that failed to register.
        name: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: prometheus::Error,
    },
}
