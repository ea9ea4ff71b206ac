//! Application-level error type for the binary's bootstrap sequence.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Errors that can abort the binary before the worker loop starts running.
#[derive(Debug, Error)]
pub enum AppError {
    /// The configuration document could not be loaded or failed validation.
    #[error("configuration operation failed")]
    Config {
        /// Underlying configuration error.
        #[source]
        source: forgecast_config::ConfigError,
    },
    /// A tracker's declarative schema document could not be parsed.
    #[error("tracker schema '{slug}' failed to parse")]
    TrackerSchema {
        /// Slug of the offending tracker entry.
        slug: String,
        /// Underlying schema error.
        #[source]
        source: forgecast_tracker::SchemaError,
    },
    /// The database connection pool could not be established.
    #[error("failed to connect to the database")]
    DatabaseConnect {
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },
    /// Migrations or store construction failed once connected.
    #[error("failed to run database migrations")]
    Migrate {
        /// Underlying migration error.
        #[source]
        source: sqlx::migrate::MigrateError,
    },
    /// The tracing subscriber or metrics registry could not be installed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: forgecast_telemetry::TelemetryError,
    },
}
